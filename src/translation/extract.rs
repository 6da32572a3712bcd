/*!
 * Recovering code from free-form backend responses.
 *
 * Both extractors are pure functions and never fail: when no structure can
 * be recognized they fall back to the whole response.
 */

use crate::app_config::ExtractionConfig;

/// Implementation text used when a header/implementation split could not be recognized
pub const SEE_HEADER_SENTINEL: &str = "SEE HEADER FOR FULL RESPONSE";

/// Shape of the output requested from a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// One code block
    Single,
    /// A header and an implementation
    HeaderImplementation,
}

/// Result of an extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Code(String),
    Split { header: String, implementation: String },
}

/// Extractor bound to the configured markers
#[derive(Debug, Clone, Default)]
pub struct ResponseExtractor {
    config: ExtractionConfig,
}

impl ResponseExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn extract(&self, mode: ExtractionMode, response: &str) -> Extracted {
        match mode {
            ExtractionMode::Single => Extracted::Code(self.first_source_code(response)),
            ExtractionMode::HeaderImplementation => {
                let (header, implementation) = self.header_implementation(response);
                Extracted::Split { header, implementation }
            }
        }
    }

    pub fn first_source_code(&self, response: &str) -> String {
        extract_first_source_code(response, &self.config.code_delimiter)
    }

    pub fn header_implementation(&self, response: &str) -> (String, String) {
        extract_header_implementation(response, &self.config)
    }
}

/// Return the content of the first fenced block, or the whole response
///
/// The block starts after the first newline following the opening delimiter and
/// ends at the next delimiter. The result is trimmed.
pub fn extract_first_source_code(response: &str, code_delimiter: &str) -> String {
    let mut code = "";

    if let Some(opening) = response.find(code_delimiter) {
        if let Some(newline) = response[opening..].find('\n').map(|i| opening + i) {
            if let Some(closing) = response[newline..].find(code_delimiter).map(|i| newline + i) {
                code = &response[newline..closing];
            }
        }
    }

    if code.is_empty() {
        code = response;
    }

    code.trim().to_string()
}

/// Split a response into header and implementation
///
/// Two layouts are recognized: two consecutive fenced blocks (header first),
/// or sections introduced by comment lines naming the files (`// Player.h`,
/// `// Player.cpp`). Once a comment marker is seen, fences are ignored for the
/// rest of the response.
pub fn extract_header_implementation(response: &str, markers: &ExtractionConfig) -> (String, String) {
    let mut header = String::new();
    let mut implementation = String::new();
    let mut in_header = false;
    let mut in_implementation = false;
    let mut comment_delimited = false;

    for line in response.lines() {
        let leading_trimmed = line.trim_start();
        let trailing_trimmed = line.trim_end();
        let is_comment = leading_trimmed.starts_with(&markers.comment_prefix);

        if leading_trimmed.starts_with(&markers.code_delimiter) {
            if comment_delimited {
                continue;
            }

            if !in_header && !in_implementation {
                if header.is_empty() {
                    in_header = true;
                } else {
                    in_implementation = true;
                }
            } else {
                in_header = false;
                in_implementation = false;
            }
        } else if is_comment && trailing_trimmed.ends_with(&markers.header_marker) {
            in_header = true;
            in_implementation = false;
            comment_delimited = true;
        } else if is_comment && trailing_trimmed.ends_with(&markers.implementation_marker) {
            in_header = false;
            in_implementation = true;
            comment_delimited = true;
        } else if in_header {
            header.push_str(line);
            header.push('\n');
        } else if in_implementation {
            implementation.push_str(line);
            implementation.push('\n');
        }
    }

    if header.is_empty() && implementation.is_empty() {
        header = response.to_string();
        implementation = SEE_HEADER_SENTINEL.to_string();
    }

    (header.trim().to_string(), implementation.trim().to_string())
}
