//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Error types and result aliases for the line codec

/// Result Type for Codec Operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while framing a telnet byte stream.
///
/// Malformed input never produces an error: undecodable text is replaced and
/// stray command bytes are dropped. Only the underlying transport can fail.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An I/O error occurred while reading from or writing to the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Check whether the error means the peer has gone away.
    pub fn is_disconnect(&self) -> bool {
        match self {
            CodecError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_kinds() {
        let err = CodecError::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(err.is_disconnect());

        let err = CodecError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(!err.is_disconnect());
    }

    #[test]
    fn test_error_display() {
        let err = CodecError::from(std::io::Error::other("boom"));
        assert_eq!(err.to_string(), "I/O error: boom");
    }
}
