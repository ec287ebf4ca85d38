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

use integration_tests::{compile, compile_with, filter, init, router};
use serde_json::json;
use tracing::info;

#[test]
fn test_accept_default_rejected_for_external_types() {
    init();
    for peer_type in ["customer", "peer", "routeserver", "routecollector", "transit"] {
        let config = router(json!({
            "ext": {
                "type": peer_type,
                "asn": 64496,
                "neighbor4": "192.0.2.1",
                "accept": {"default": true},
            }
        }));
        let err = compile(config).unwrap_err();
        info!("{}: {}", peer_type, err);
        assert_eq!(err.key(), Some("peers.ext.accept.default"), "{}", peer_type);
    }
}

#[test]
fn test_compile_is_reproducible() {
    init();
    let config = router(json!({
        "cust": {
            "type": "customer",
            "asn": 64496,
            "neighbor4": "192.0.2.10",
            "neighbor6": "2001:db8::10",
            "filter": {"as-set": ["AS-CUST"], "asns": [64496]},
            "actions": [
                {"matches": {"prefix": ["198.51.100.0/24+", "2001:db8:1::/48"]},
                 "action": {"large_community": {"add": ["65000:1:840"]}}}
            ],
        },
        "transit1": {"type": "transit", "asn": 64497, "neighbor4": "192.0.2.20"},
    }));
    let lookup = json!({
        "irr": {"AS-CUST": {"ipv4": ["198.51.100.0/24"], "ipv6": ["2001:db8:1::/48"], "asns": [64499]}},
    });
    let first = compile_with(config.clone(), lookup.clone()).unwrap();
    let second = compile_with(config, lookup).unwrap();
    assert_eq!(first, second);
    assert!(first.contains("  # 1 from IRR object AS-CUST\n"));
}

#[test]
fn test_filtered_routes_never_reach_main_table() {
    init();
    let text = compile(router(json!({
        "p1": {"type": "peer", "asn": 64496, "neighbor4": "192.0.2.1", "neighbor6": "2001:db8::1"},
    })))
    .unwrap();
    for name in ["f_bgp4_p1_to_main", "f_bgp6_p1_to_main"] {
        let to_main = filter(&text, name).unwrap();
        let lines: Vec<&str> = to_main.lines().collect();
        assert_eq!(
            lines,
            vec![
                format!("filter {}", name).as_str(),
                "{",
                "  if bgp_large_community ~ [(65000, 1101, *)] then reject;",
                "  accept;",
                "}",
            ]
        );
    }
    assert!(text.contains("  export filter f_bgp4_p1_to_main;\n"));
}

#[test]
fn test_prepend_resolution_prefers_three() {
    init();
    let text = compile(router(json!({
        "t1": {"type": "transit", "asn": 64497, "neighbor4": "192.0.2.20"},
    })))
    .unwrap();
    let start = text.find("function bgp_export_prepend(int peer_asn)").unwrap();
    let body = &text[start..];
    let body = &body[..body.find("\n}\n").unwrap()];
    let three = body.find("(65000, 63, peer_asn)").unwrap();
    let two = body.find("} else if (65000, 62, peer_asn)").unwrap();
    let one = body.find("(65000, 61, peer_asn)").unwrap();
    assert!(three < two && two < one);
    // Exactly 3 + 2 + 1 prepends, one chain.
    assert_eq!(body.matches("bgp_path.prepend(BGP_ASN);").count(), 6);
    assert!(text.contains("    bgp_export_prepend(64497);\n"));
}

#[test]
fn test_redistribute_connected_requires_import() {
    init();
    let err = compile(router(json!({
        "cust": {
            "type": "customer",
            "asn": 64496,
            "neighbor4": "192.0.2.10",
            "redistribute": {"connected": true},
        },
    })))
    .unwrap_err();
    assert_eq!(err.key(), Some("peers.cust.redistribute.connected"));
}

#[test]
fn test_rrclient_default_route_branch() {
    init();
    let peer = |accept_default: bool| {
        router(json!({
            "rr1": {
                "type": "rrclient",
                "asn": 65000,
                "neighbor4": "10.0.0.2",
                "neighbor6": "fd00::2",
                "accept": {"default": accept_default},
            },
        }))
    };

    let text = compile(peer(false)).unwrap();
    let import4 = filter(&text, "f_bgp4_rr1_import").unwrap();
    let import6 = filter(&text, "f_bgp6_rr1_import").unwrap();
    assert!(import4.contains("  if net = 0.0.0.0/0 then bgp_large_community.add((65000, 1101, 11));\n"));
    assert!(import6.contains("  if net = ::/0 then bgp_large_community.add((65000, 1101, 11));\n"));

    let text = compile(peer(true)).unwrap();
    for name in ["f_bgp4_rr1_import", "f_bgp6_rr1_import"] {
        let import = filter(&text, name).unwrap();
        assert!(!import.contains("(65000, 1101, 11)"), "{}", import);
        assert_eq!(import.matches("accept;").count(), 1, "{}", import);
    }
}

#[test]
fn test_quarantined_rrclient_default_route_is_tagged() {
    init();
    let text = compile(router(json!({
        "rr1": {
            "type": "rrclient",
            "asn": 65000,
            "neighbor4": "10.0.0.2",
            "accept": {"default": true},
            "quarantine": true,
            "incoming-large-communities": ["65000:1:840"],
        },
    })))
    .unwrap();
    let import = filter(&text, "f_bgp4_rr1_import").unwrap();
    let quarantined = import.find("bgp_large_community.add((65000, 1101, 17));").unwrap();
    let incoming = import.find("bgp_large_community.add((65000, 1, 840));").unwrap();
    let accept = import.find("accept;").unwrap();
    assert!(quarantined < incoming && incoming < accept, "{}", import);
}

#[test]
fn test_rrclient_requires_cluster_id() {
    init();
    let mut config = router(json!({
        "rr1": {"type": "rrclient", "asn": 65000, "neighbor4": "10.0.0.2"},
    }));
    config
        .as_object_mut()
        .unwrap()
        .remove("cluster_id");
    let err = compile(config).unwrap_err();
    assert!(err.to_string().contains("cluster_id"), "{}", err);
}

#[test]
fn test_unknown_keys_are_rejected() {
    init();
    for (stanza, field) in [
        (json!({"filter": {"prefix": []}}), "prefix"),
        (json!({"accept": {"defaults": true}}), "defaults"),
        (json!({"redistribute": {"bgp_peer": true}}), "bgp_peer"),
        (json!({"redistribute": {"static": {"communities": []}}}), "communities"),
        (json!({"actions": [{"action": {"prepend": 1, "reject": true}}]}), "reject"),
        (json!({"actions": [{"action": {"prepend": 1, "bogus": 2}}]}), "bogus"),
    ] {
        let mut peer = json!({"type": "peer", "asn": 64496, "neighbor4": "192.0.2.1"});
        for (k, v) in stanza.as_object().unwrap() {
            peer[k] = v.clone();
        }
        let err = compile(router(json!({"p1": peer}))).unwrap_err();
        assert_eq!(err.key(), Some("config"), "{}", stanza);
        assert!(
            err.to_string().contains(&format!("unknown field `{}`", field)),
            "{}: {}",
            stanza,
            err
        );
    }
}

#[test]
fn test_unresolved_as_set() {
    init();
    let err = compile(router(json!({
        "cust": {"type": "customer", "asn": 64496, "neighbor4": "192.0.2.10",
                 "filter": {"as-set": ["AS-UNKNOWN"]}},
    })))
    .unwrap_err();
    assert_eq!(err.key(), Some("peers.cust.filter.as-set"));
}
