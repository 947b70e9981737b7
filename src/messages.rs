use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::SwitchId;

/// Control-plane messages, one JSON object per UDP datagram. The
/// `signal` field is the discriminator the switches key on.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "signal")]
pub enum ControlMessage {
    #[serde(rename = "REGISTER_REQUEST")]
    RegisterRequest { id: SwitchId },

    #[serde(rename = "REGISTER_RESPONSE")]
    RegisterResponse {
        neighbors: HashMap<SwitchId, SwitchStatus>,
    },

    #[serde(rename = "TOPOLOGY_UPDATE")]
    TopologyReport {
        id: SwitchId,
        live_neighbors: Vec<SwitchId>,
    },

    #[serde(rename = "ROUTE_UPDATE")]
    RouteUpdate { table: Vec<ForwardingEntry> },
}

// Deserialize is implemented by hand rather than derived: serde's
// internally-tagged-enum support buffers the payload through its
// `Content` representation before re-parsing each variant, and that
// buffering does not coerce JSON object-key strings (e.g. `"2"`) into
// integer map keys the way `serde_json::from_str` does directly on a
// concrete struct. Sniffing the `signal` tag first and deserializing
// each variant straight from the `serde_json::Value` sidesteps that
// limitation while keeping the wire format identical.
impl<'de> Deserialize<'de> for ControlMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        struct Tagged {
            signal: String,
            #[serde(flatten)]
            rest: serde_json::Value,
        }

        let Tagged { signal, rest } = Tagged::deserialize(deserializer)?;
        match signal.as_str() {
            "REGISTER_REQUEST" => {
                #[derive(Deserialize)]
                struct Body {
                    id: SwitchId,
                }
                let body: Body = serde_json::from_value(rest).map_err(D::Error::custom)?;
                Ok(ControlMessage::RegisterRequest { id: body.id })
            }
            "REGISTER_RESPONSE" => {
                #[derive(Deserialize)]
                struct Body {
                    neighbors: HashMap<SwitchId, SwitchStatus>,
                }
                let body: Body = serde_json::from_value(rest).map_err(D::Error::custom)?;
                Ok(ControlMessage::RegisterResponse {
                    neighbors: body.neighbors,
                })
            }
            "TOPOLOGY_UPDATE" => {
                #[derive(Deserialize)]
                struct Body {
                    id: SwitchId,
                    live_neighbors: Vec<SwitchId>,
                }
                let body: Body = serde_json::from_value(rest).map_err(D::Error::custom)?;
                Ok(ControlMessage::TopologyReport {
                    id: body.id,
                    live_neighbors: body.live_neighbors,
                })
            }
            "ROUTE_UPDATE" => {
                #[derive(Deserialize)]
                struct Body {
                    table: Vec<ForwardingEntry>,
                }
                let body: Body = serde_json::from_value(rest).map_err(D::Error::custom)?;
                Ok(ControlMessage::RouteUpdate { table: body.table })
            }
            other => Err(D::Error::custom(format!("unknown signal: {other}"))),
        }
    }
}

/// Per-switch status as reported to a newly registered switch. Host
/// and port are absent for switches that are not currently active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStatus {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// One row of a switch's forwarding table: traffic for `dest` leaves
/// via `next_hop` on a path whose bottleneck is `bandwidth`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardingEntry {
    pub dest: SwitchId,
    pub next_hop: SwitchId,
    pub bandwidth: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_register_request_from_switch_json() {
        // Exact shape the switch agents put on the wire.
        let msg: ControlMessage =
            serde_json::from_str(r#"{"signal": "REGISTER_REQUEST", "id": 3}"#).unwrap();
        match msg {
            ControlMessage::RegisterRequest { id } => assert_eq!(id, 3),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn decodes_topology_update_with_live_neighbors() {
        let msg: ControlMessage = serde_json::from_str(
            r#"{"signal": "TOPOLOGY_UPDATE", "id": 2, "live_neighbors": [1, 4]}"#,
        )
        .unwrap();
        match msg {
            ControlMessage::TopologyReport { id, live_neighbors } => {
                assert_eq!(id, 2);
                assert_eq!(live_neighbors, vec![1, 4]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn route_update_carries_signal_discriminator() {
        let msg = ControlMessage::RouteUpdate {
            table: vec![ForwardingEntry {
                dest: 2,
                next_hop: 3,
                bandwidth: 50,
            }],
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["signal"], "ROUTE_UPDATE");
        assert_eq!(json["table"][0]["next_hop"], 3);
    }

    #[test]
    fn register_response_omits_address_of_inactive_switches() {
        let mut neighbors = HashMap::new();
        neighbors.insert(
            2,
            SwitchStatus {
                active: false,
                host: None,
                port: None,
            },
        );
        let json = serde_json::to_value(&ControlMessage::RegisterResponse { neighbors }).unwrap();
        assert_eq!(json["neighbors"]["2"], serde_json::json!({"active": false}));
    }
}

