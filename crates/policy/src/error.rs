// Copyright 2021 Rayhaan Jaufeerally.
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

use thiserror::Error;

/// Errors raised while turning a peering configuration into filter programs.
///
/// Every error is raised before any output is produced, the compiler never
/// emits a partial configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The configuration is invalid. `key` is the dotted path of the
    /// offending configuration key, e.g. `peers.upstream1.accept.default`.
    #[error("configuration error in `{key}`: {message}")]
    Configuration { key: String, message: String },

    /// A community did not decode against the known function codes. This
    /// signals a codec mismatch rather than a user error.
    #[error("invalid community {community}: {reason}")]
    InvalidCommunity { community: String, reason: String },
}

impl PolicyError {
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        PolicyError::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// The configuration key this error refers to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            PolicyError::Configuration { key, .. } => Some(key),
            PolicyError::InvalidCommunity { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PolicyError>;
