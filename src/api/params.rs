// src/api/params.rs

//! Request bodies accepted by the actor endpoints and their translation into
//! actor input.
//!
//! Actor input is a JSON object. Plain fields are wrapped as
//! `{"value": <v>}`; port collections keep their own shapes
//! (`{"ports": [...]}`).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// `{"value": v}` wrapper used for plain actor-input fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjValue<T: Serialize> {
    pub value: T,
}

fn wrap<T: Serialize>(value: T) -> ObjValue<T> {
    ObjValue { value }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub source: u16,
    pub target: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpPortsUserMapping {
    #[serde(default)]
    pub ports: Vec<PortMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedTcpPorts {
    #[serde(default)]
    pub ports: Vec<u16>,
}

/// A request body that maps onto exactly one actor.
pub trait ActorRequest: DeserializeOwned + Send + 'static {
    /// Name of the actor that serves this request.
    const ACTOR: &'static str;

    /// Canonical actor input for this request.
    fn actor_input(&self) -> Value;
}

/// Body of `POST /migrate-machine`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MigrateParams {
    pub start_container: bool,
    pub container_name: String,
    pub force_create: bool,
    pub source_host: String,
    pub source_user: String,
    pub target_host: String,
    pub target_user: String,
    pub excluded_paths: Vec<String>,
    pub use_default_port_map: bool,
    pub tcp_ports_user_mapping: TcpPortsUserMapping,
    pub excluded_tcp_ports: ExcludedTcpPorts,
}

impl ActorRequest for MigrateParams {
    const ACTOR: &'static str = "migrate-machine";

    fn actor_input(&self) -> Value {
        json!({
            "start_container": wrap(self.start_container),
            "container_name": wrap(&self.container_name),
            "force_create": wrap(self.force_create),
            "source_host": wrap(&self.source_host),
            "source_user_name": wrap(&self.source_user),
            "target_host": wrap(&self.target_host),
            "target_user_name": wrap(&self.target_user),
            "excluded_paths": wrap(&self.excluded_paths),
            "use_default_port_map": wrap(self.use_default_port_map),
            "tcp_ports_user_mapping": self.tcp_ports_user_mapping,
            "excluded_tcp_ports": self.excluded_tcp_ports,
        })
    }
}

/// Body of `POST /port-inspect`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PortInspectParams {
    pub target_host: String,
    pub port_range: String,
    pub shallow_scan: bool,
}

impl ActorRequest for PortInspectParams {
    const ACTOR: &'static str = "portscan";

    fn actor_input(&self) -> Value {
        json!({
            "host": wrap(&self.target_host),
            "scan_options": {
                "shallow_scan": self.shallow_scan,
                "port_range": self.port_range,
                "force_nmap": !self.shallow_scan,
            },
        })
    }
}

/// Body of `POST /port-map`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PortMapParams {
    pub source_host: String,
    pub target_host: String,
    pub tcp_ports: TcpPortsUserMapping,
    pub excluded_tcp_ports: ExcludedTcpPorts,
    pub default_port_map: bool,
}

impl ActorRequest for PortMapParams {
    const ACTOR: &'static str = "port-mapping";

    fn actor_input(&self) -> Value {
        json!({
            "source_host": wrap(&self.source_host),
            "target_host": wrap(&self.target_host),
            "use_default_port_map": wrap(self.default_port_map),
            "tcp_ports_user_mapping": self.tcp_ports,
            "excluded_tcp_ports": self.excluded_tcp_ports,
        })
    }
}

/// Body of `POST /check-target`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckTargetParams {
    pub target_host: String,
    pub target_user: String,
}

impl ActorRequest for CheckTargetParams {
    const ACTOR: &'static str = "remote-target-check-group";

    fn actor_input(&self) -> Value {
        json!({
            "target_host": wrap(&self.target_host),
            "target_user_name": wrap(&self.target_user),
        })
    }
}

/// Body of `POST /destroy-container`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DestroyContainerParams {
    pub target_host: String,
    pub target_user: String,
    pub container_name: String,
}

impl ActorRequest for DestroyContainerParams {
    const ACTOR: &'static str = "destroy-container";

    fn actor_input(&self) -> Value {
        json!({
            "target_host": wrap(&self.target_host),
            "target_user_name": wrap(&self.target_user),
            "container_name": wrap(&self.container_name),
        })
    }
}
