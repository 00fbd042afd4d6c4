// Copyright 2025 The cobs-rs Authors
// Derived from bingmann/cobs (https://github.com/bingmann/cobs)
// Copyright 2018 Timo Bingmann, Florian Gauger
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::error::Error as StdError;
use std::fmt::{self, Display};

/// Typed errors returned by construction and query operations.
#[derive(Debug)]
pub enum Error {
    /// Bad user input: malformed parameter, query shorter than `k`, empty corpus.
    InvalidArgument(String),
    /// Underlying open/read/write/mmap failure, with the offending path where known.
    Io(String),
    /// Bad magic, version mismatch, truncated header, or payload length drift.
    Format(String),
    /// Requested signature exceeds addressable limits, or the RAM bound fits no batch.
    OutOfResources(String),
    /// Output directory exists and neither clobber nor continue was given.
    AlreadyExists(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(s) => write!(f, "invalid argument: {}", s),
            Error::Io(s) => write!(f, "i/o error: {}", s),
            Error::Format(s) => write!(f, "format error: {}", s),
            Error::OutOfResources(s) => write!(f, "out of resources: {}", s),
            Error::AlreadyExists(s) => write!(f, "already exists: {}", s),
        }
    }
}

impl StdError for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
