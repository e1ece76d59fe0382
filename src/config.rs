//! `MachineMasterConfiguration`: the YAML-loaded, validated configuration
//! the main binary builds its mapper, collectors, and frontend from. Field
//! shapes follow §6's "Configuration" list plus the ambient additions
//! (`redfish_backends`, `log_level`) recorded in SPEC_FULL.md.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::devpath::{AgentEntry, InvertOp, MapperConfig, MergeOp, MergeOpKind, MergeSpec, StaticUpdater};
use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub os_domain: String,
    #[serde(default)]
    pub fallback_plugin: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvertOpConfig {
    pub agent: String,
    pub new_root_devpath: String,
    #[serde(default)]
    pub upstream_connectors: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOpKindConfig {
    PluggedInNode {
        base_devpath: String,
        appendant_devpath: String,
        connector: String,
    },
    SameNode {
        base_devpath: String,
        appendant_devpath: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct MergeOpConfig {
    pub base_agent: String,
    pub appendant_agent: String,
    #[serde(flatten)]
    pub kind: MergeOpKindConfig,
}

#[derive(Debug, Deserialize)]
pub struct MergeSpecConfig {
    pub root: String,
    #[serde(default)]
    pub invert_ops: Vec<InvertOpConfig>,
    #[serde(default)]
    pub merge_ops: Vec<MergeOpConfig>,
}

#[derive(Debug, Deserialize)]
pub struct UnixDomainConfig {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Default)]
pub struct GrpcConfig {
    pub unix_domain: Option<UnixDomainConfig>,
    pub network: Option<NetworkConfig>,
}

#[derive(Debug, Deserialize)]
pub struct FrontendConfig {
    pub grpc: GrpcConfig,
}

/// One agent's concrete Redfish backend: base URL to crawl, poll cadence
/// for its snapshot updater, and the `os_type` its collector reports (no
/// Redfish field carries this; see `RedfishResourceCollector`).
#[derive(Debug, Deserialize)]
pub struct RedfishBackendConfig {
    pub agent: String,
    pub base_url: String,
    pub os_type: String,
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_fetch_timeout")]
    pub fetch_timeout: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Deserialize)]
pub struct MachineMasterConfiguration {
    pub agents: Vec<AgentConfig>,
    pub merge_spec: MergeSpecConfig,
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub redfish_backends: Vec<RedfishBackendConfig>,
    #[serde(default)]
    pub log_level: Option<String>,
}

impl MachineMasterConfiguration {
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
        Self::from_yaml(&contents).map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))
    }

    /// Builds the `MapperConfig` the `GraphDevpathMapper` is constructed
    /// from. Every agent starts out with a `StaticUpdater`; the caller (see
    /// `main::run`) swaps in a `RedfishSnapshotUpdater` for any agent backed
    /// by a `redfish_backends` entry. An agent with neither a Redfish
    /// backend nor a reachable one always falls back to its
    /// `fallback_plugin` list (see §4.5's outage-resilience fallback).
    pub fn build_mapper_config(&self) -> Result<MapperConfig, ConfigError> {
        let mut seen = std::collections::HashSet::new();
        let mut agents = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            if !seen.insert(agent.name.clone()) {
                return Err(ConfigError::DuplicateAgent(agent.name.clone()));
            }
            agents.push(AgentEntry::new(
                agent.name.clone(),
                agent.os_domain.clone(),
                agent.fallback_plugin.clone(),
                Box::new(StaticUpdater),
            ));
        }

        let invert_ops = self
            .merge_spec
            .invert_ops
            .iter()
            .map(|op| InvertOp {
                agent: op.agent.clone(),
                new_root_local_devpath: op.new_root_devpath.clone(),
                upstream_connectors: op.upstream_connectors.clone(),
            })
            .collect();

        let merge_ops = self
            .merge_spec
            .merge_ops
            .iter()
            .map(|op| MergeOp {
                base_agent: op.base_agent.clone(),
                appendant_agent: op.appendant_agent.clone(),
                kind: match &op.kind {
                    MergeOpKindConfig::PluggedInNode {
                        base_devpath,
                        appendant_devpath,
                        connector,
                    } => MergeOpKind::PluggedInNode {
                        base_devpath: base_devpath.clone(),
                        appendant_devpath: appendant_devpath.clone(),
                        connector: connector.clone(),
                    },
                    MergeOpKindConfig::SameNode {
                        base_devpath,
                        appendant_devpath,
                    } => MergeOpKind::SameNode {
                        base_devpath: base_devpath.clone(),
                        appendant_devpath: appendant_devpath.clone(),
                    },
                },
            })
            .collect();

        Ok(MapperConfig {
            agents,
            invert_ops,
            merge_spec: MergeSpec {
                root: self.merge_spec.root.clone(),
                merge_ops,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_linear_merge_yaml() {
        let yaml = r#"
agents:
  - name: a1
    os_domain: a1
    fallback_plugin: ["/phys", "/phys/A", "/phys/A/B"]
  - name: a2
    os_domain: a2
    fallback_plugin: ["/phys", "/phys/C"]
merge_spec:
  root: a1
  merge_ops:
    - base_agent: a1
      appendant_agent: a2
      plugged_in_node:
        base_devpath: /phys/A/B
        appendant_devpath: /phys
        connector: PADS1
frontend:
  grpc:
    unix_domain:
      path: /tmp/mmaster.sock
redfish_backends:
  - agent: a1
    base_url: http://a1.local
    os_type: linux
    poll_interval: 30s
"#;
        let config = MachineMasterConfiguration::from_yaml(yaml).unwrap();
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.redfish_backends[0].poll_interval, Duration::from_secs(30));
        assert_eq!(config.frontend.grpc.unix_domain.unwrap().path, "/tmp/mmaster.sock");

        let mapper_config = config.build_mapper_config().unwrap();
        assert_eq!(mapper_config.agents.len(), 2);
        assert_eq!(mapper_config.merge_spec.merge_ops.len(), 1);
    }

    #[test]
    fn duplicate_agent_name_is_rejected() {
        let yaml = r#"
agents:
  - name: a1
    os_domain: a1
    fallback_plugin: ["/phys"]
  - name: a1
    os_domain: a2
    fallback_plugin: ["/phys"]
merge_spec:
  root: a1
frontend:
  grpc:
    network:
      port: 9999
"#;
        let config = MachineMasterConfiguration::from_yaml(yaml).unwrap();
        assert!(matches!(config.build_mapper_config(), Err(ConfigError::DuplicateAgent(_))));
    }
}
