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

//! Compiles BGP peering relationships and redistribution intent into BIRD 2
//! filters, tables, pipes and protocols.

pub mod community;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod error;
pub mod family;
pub mod filter_builder;
pub mod functions;
pub mod lookup;
pub mod parse;
pub mod peer_policy;
pub mod pipes;
pub mod prefix;
pub mod rules;
pub mod statement;

pub use compiler::PolicyCompiler;
pub use config::RouterConfig;
pub use error::{PolicyError, Result};
pub use lookup::{ExternalLookup, StaticLookup};
