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

//! Shared fixtures for the compiler integration tests.

use bgp_policy::{PolicyCompiler, PolicyError, RouterConfig, StaticLookup};
use serde_json::{json, Value};

pub fn init() {
    match tracing_subscriber::fmt()
        .with_env_filter("bgp_policy=trace")
        .try_init()
    {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Failed to setup tracing: {}", e);
        }
    }
}

/// A router configuration with the given peers and no other settings.
pub fn router(peers: Value) -> Value {
    json!({
        "asn": 65000,
        "router_id": "192.0.2.254",
        "cluster_id": "0.0.0.1",
        "import": {"connected": false, "kernel": false, "static": true},
        "originate": ["192.0.2.0/24", "2001:db8::/32"],
        "peers": peers,
    })
}

pub fn compile_with(config: Value, lookup: Value) -> Result<String, PolicyError> {
    let config = RouterConfig::from_json_str(&config.to_string())?;
    let lookup = StaticLookup::from_json_str(&lookup.to_string())?;
    PolicyCompiler::new(config, &lookup)?.compile()
}

pub fn compile(config: Value) -> Result<String, PolicyError> {
    compile_with(config, json!({}))
}

/// The text of `filter name` up to and including its closing brace.
pub fn filter<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let start = text.find(&format!("filter {}\n", name))?;
    let end = text[start..].find("\n}\n")?;
    Some(&text[start..start + end + 3])
}
