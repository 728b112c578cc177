// Copyright (c) 2022 MASSA LABS <info@massa.net>

use displaydoc::Display;
use thiserror::Error;

/// Errors of the signature component.
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum HostSignatureError {
    /// Signature error: {0}
    SignatureError(String),
    /// Parsing error: {0}
    ParsingError(String),
}
