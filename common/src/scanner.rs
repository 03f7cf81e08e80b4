//! A C preprocessor include scanner, used for CUDA sources as they share the syntax.

use serde::Serialize;

/// Dependency scanners a source suffix can be registered with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ScannerKind {
    /// `#include "..."` and `#include <...>` directives.
    CInclude,
}

/// One `#include` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Include {
    pub path: String,
    /// Angle-bracket includes are searched for on the system include path only.
    pub system: bool,
}

impl ScannerKind {
    #[must_use]
    pub fn scan(self, text: &str) -> Vec<Include> {
        match self {
            ScannerKind::CInclude => scan_includes(text),
        }
    }
}

/// Find every include directive in a source file, in order.
#[must_use]
pub fn scan_includes(text: &str) -> Vec<Include> {
    text.lines().filter_map(parse_include).collect()
}

fn parse_include(line: &str) -> Option<Include> {
    let rest = line.trim_start().strip_prefix('#')?;
    let rest = rest.trim_start().strip_prefix("include")?.trim_start();
    let (close, system) = match rest.chars().next()? {
        '"' => ('"', false),
        '<' => ('>', true),
        _ => return None,
    };
    let inner = &rest[1..];
    let end = inner.find(close)?;
    Some(Include {
        path: inner[..end].to_string(),
        system,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(path: &str) -> Include {
        Include {
            path: path.to_string(),
            system: false,
        }
    }

    fn system(path: &str) -> Include {
        Include {
            path: path.to_string(),
            system: true,
        }
    }

    #[test_log::test]
    fn test_scan_includes() {
        let source = r#"
#include <cuda_runtime.h>
#include "kernels/common.cuh"
  #  include   <cstdio>
#define BLOCK 256
#pragma once

__global__ void add(float *a) { a[threadIdx.x] += 1.0f; }
"#;

        assert_eq!(
            scan_includes(source),
            vec![
                system("cuda_runtime.h"),
                local("kernels/common.cuh"),
                system("cstdio"),
            ]
        );
    }

    #[test_log::test]
    fn test_scan_ignores_malformed_and_macros() {
        let source = "#include HEADER\n#include \"unterminated\n#includes <x>\n// #include \"commented.h\"\n";

        assert_eq!(scan_includes(source), Vec::<Include>::new());
    }

    #[test_log::test]
    fn test_scanner_kind_dispatch() {
        assert_eq!(ScannerKind::CInclude.scan("#include \"a.h\""), vec![local("a.h")]);
    }
}
