use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::transport::post_xml;
use super::xmlrpc::{encode_call, parse_response, Value};
use super::{NodeClient, NodeRegistry, RpcError};
use crate::config::ReporterConfig;

/// Topic (or service) name paired with the nodes attached to it.
pub type Attachment = (String, Vec<String>);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemState {
    pub publishers: Vec<Attachment>,
    pub subscribers: Vec<Attachment>,
    pub services: Vec<Attachment>,
}

impl SystemState {
    fn from_value(value: &Value) -> Result<Self, RpcError> {
        let sections = value
            .as_array()
            .filter(|sections| sections.len() == 3)
            .ok_or_else(|| {
                RpcError::Malformed("system state is not [pubs, subs, srvs]".to_string())
            })?;

        Ok(SystemState {
            publishers: attachments(&sections[0])?,
            subscribers: attachments(&sections[1])?,
            services: attachments(&sections[2])?,
        })
    }

    /// Every node that publishes, subscribes or provides a service, once.
    pub fn node_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .publishers
            .iter()
            .chain(&self.subscribers)
            .chain(&self.services)
            .flat_map(|(_, nodes)| nodes.iter().map(String::as_str))
            .collect();
        names.into_iter().map(str::to_string).collect()
    }
}

fn attachments(value: &Value) -> Result<Vec<Attachment>, RpcError> {
    let malformed = || RpcError::Malformed("bad [name, [nodes]] entry in system state".to_string());

    let entries = value.as_array().ok_or_else(malformed)?;
    entries
        .iter()
        .map(|entry| {
            let pair = entry.as_array().filter(|pair| pair.len() == 2).ok_or_else(malformed)?;
            let name = pair[0].as_str().ok_or_else(malformed)?;
            let nodes = pair[1]
                .as_array()
                .ok_or_else(malformed)?
                .iter()
                .map(|node| node.as_str().map(str::to_string).ok_or_else(malformed))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((name.to_string(), nodes))
        })
        .collect()
}

/// Calls a ROS API method: `caller_id` goes first, the reply is
/// `[code, statusMessage, value]` and only code 1 counts as success.
async fn ros_call(
    uri: &str,
    caller_id: &str,
    method: &str,
    args: &[&str],
    limit: Duration,
) -> Result<Value, RpcError> {
    let mut params = Vec::with_capacity(args.len() + 1);
    params.push(caller_id);
    params.extend_from_slice(args);

    let body = encode_call(method, &params);
    let response = post_xml(uri, &body, limit).await?;
    unwrap_status(parse_response(&response)?)
}

fn unwrap_status(value: Value) -> Result<Value, RpcError> {
    let Value::Array(mut triple) = value else {
        return Err(RpcError::Malformed(
            "expected [code, statusMessage, value]".to_string(),
        ));
    };
    if triple.len() != 3 {
        return Err(RpcError::Malformed(format!(
            "expected 3 elements in reply, got {}",
            triple.len()
        )));
    }

    let payload = triple.pop().unwrap_or(Value::Nil);
    let message = triple[1].as_str().unwrap_or_default().to_string();
    let code = triple[0]
        .as_i64()
        .ok_or_else(|| RpcError::Malformed("status code is not an int".to_string()))?;
    if code != 1 {
        return Err(RpcError::Status { code, message });
    }
    Ok(payload)
}

/// Client for the master's registration API.
pub struct RosMaster {
    uri: String,
    caller_id: String,
    timeout: Duration,
}

impl RosMaster {
    pub fn new(uri: impl Into<String>, caller_id: impl Into<String>, timeout: Duration) -> Self {
        RosMaster {
            uri: uri.into(),
            caller_id: caller_id.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ReporterConfig) -> Self {
        RosMaster::new(
            config.master_uri.clone(),
            config.caller_id.clone(),
            config.rpc_timeout(),
        )
    }

    pub async fn system_state(&self) -> Result<SystemState, RpcError> {
        let value = ros_call(&self.uri, &self.caller_id, "getSystemState", &[], self.timeout).await?;
        SystemState::from_value(&value)
    }
}

#[async_trait]
impl NodeRegistry for RosMaster {
    async fn node_names(&self) -> Result<Vec<String>, RpcError> {
        let names = self.system_state().await?.node_names();
        debug!("master {} lists {} nodes", self.uri, names.len());
        Ok(names)
    }

    async fn lookup_node(&self, name: &str) -> Result<String, RpcError> {
        let value = ros_call(&self.uri, &self.caller_id, "lookupNode", &[name], self.timeout).await?;
        match value {
            Value::String(uri) => Ok(uri),
            other => Err(RpcError::Malformed(format!(
                "lookupNode returned {:?} instead of a uri",
                other
            ))),
        }
    }
}

/// Client for the per-node slave API.
pub struct RosNodeClient {
    caller_id: String,
    timeout: Duration,
}

impl RosNodeClient {
    pub fn new(caller_id: impl Into<String>, timeout: Duration) -> Self {
        RosNodeClient {
            caller_id: caller_id.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ReporterConfig) -> Self {
        RosNodeClient::new(config.caller_id.clone(), config.rpc_timeout())
    }
}

#[async_trait]
impl NodeClient for RosNodeClient {
    async fn get_pid(&self, uri: &str) -> Result<u32, RpcError> {
        let value = ros_call(uri, &self.caller_id, "getPid", &[], self.timeout).await?;
        value
            .as_i64()
            .and_then(|pid| u32::try_from(pid).ok())
            .ok_or_else(|| RpcError::Malformed(format!("getPid returned {:?}", value)))
    }
}
