use std::collections::HashSet;

use serde::Deserialize;

use axisdesc_core::error::{AxisError, Result};
use axisdesc_core::module::Version;
use axisdesc_core::wsdl::{Direction, Mep};

fn bad(msg: impl Into<String>) -> AxisError {
    AxisError::BadDescriptor(msg.into())
}

fn ensure_unique<'a>(what: &str, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(bad(format!("{what} name must not be empty")));
        }
        if !seen.insert(name) {
            return Err(bad(format!("duplicate {what}: {name}")));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
    pub version: u32,

    #[serde(default)]
    pub phases: Option<PhasesSection>,

    /// Parameters of the configuration node.
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,

    /// Named policies, registered on the configuration node.
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,

    /// Policies attached to the configuration node itself.
    #[serde(default)]
    pub attach: Vec<String>,

    /// Modules engaged globally.
    #[serde(default)]
    pub engage: Vec<String>,

    #[serde(default)]
    pub modules: Vec<ModuleConfig>,

    #[serde(default)]
    pub service_groups: Vec<ServiceGroupConfig>,
}

impl DeploymentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(bad(format!("unsupported descriptor version {}", self.version)));
        }
        if let Some(phases) = &self.phases {
            phases.validate()?;
        }
        ensure_unique("policy", self.policies.iter().map(|p| p.name.as_str()))?;
        for p in &self.policies {
            p.validate()?;
        }
        for m in &self.modules {
            m.validate()?;
        }
        // Several versions of one module may be deployed side by side.
        let archives: Vec<String> = self.modules.iter().map(ModuleConfig::archive_name).collect();
        ensure_unique("module", archives.iter().map(String::as_str))?;

        let scope = Scope { cfg: self };
        scope.check_level("configuration", &self.parameters, &self.attach, &self.engage)?;
        ensure_unique(
            "service group",
            self.service_groups.iter().map(|g| g.name.as_str()),
        )?;
        for g in &self.service_groups {
            g.validate(&scope)?;
        }
        Ok(())
    }

    pub(crate) fn policy(&self, name: &str) -> Option<&PolicyConfig> {
        self.policies.iter().find(|p| p.name == name)
    }

    pub(crate) fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.name == name)
    }
}

/// Cross-reference checks against the top-level tables.
pub(crate) struct Scope<'a> {
    cfg: &'a DeploymentConfig,
}

impl Scope<'_> {
    fn check_level(
        &self,
        level: &str,
        parameters: &[ParameterConfig],
        policies: &[String],
        engage: &[String],
    ) -> Result<()> {
        ensure_unique(
            &format!("{level} parameter"),
            parameters.iter().map(|p| p.name.as_str()),
        )?;
        for name in policies {
            // `#name` references resolve lazily; still catch typos here.
            let key = name.strip_prefix('#').unwrap_or(name);
            if self.cfg.policy(key).is_none() {
                return Err(bad(format!("{level}: unknown policy {name}")));
            }
        }
        for name in engage {
            if self.cfg.module(name).is_none() && !self.is_archive_name(name) {
                return Err(bad(format!("{level}: unknown module {name}")));
            }
        }
        Ok(())
    }

    fn is_archive_name(&self, archive: &str) -> bool {
        self.cfg.modules.iter().any(|m| m.archive_name() == archive)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhasesSection {
    #[serde(rename = "in")]
    pub in_phases: Vec<String>,
    #[serde(rename = "out")]
    pub out_phases: Vec<String>,
}

impl PhasesSection {
    fn validate(&self) -> Result<()> {
        ensure_unique("in phase", self.in_phases.iter().map(String::as_str))?;
        ensure_unique("out phase", self.out_phases.iter().map(String::as_str))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    #[default]
    Text,
    Xml,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterConfig {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub kind: ParameterKind,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssertionConfig {
    #[serde(default)]
    pub namespace: String,
    pub local: String,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Each alternative is a list of assertions. An empty list of
    /// alternatives is a policy nobody can satisfy.
    pub alternatives: Vec<Vec<AssertionConfig>>,
}

impl PolicyConfig {
    fn validate(&self) -> Result<()> {
        for alternative in &self.alternatives {
            if alternative.iter().any(|a| a.local.is_empty()) {
                return Err(bad(format!(
                    "policy {}: assertion local name must not be empty",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerConfig {
    pub name: String,
    pub phase: String,
    pub flow: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Policy namespaces the module governs.
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
    /// Assertions (Clark notation) the module cannot enforce.
    #[serde(default)]
    pub refuses: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
}

impl ModuleConfig {
    /// `name` or `name-version`, as the registry keys the module.
    pub fn archive_name(&self) -> String {
        match &self.version {
            Some(v) => format!("{}-{v}", self.name),
            None => self.name.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(bad("module name must not be empty"));
        }
        if let Some(v) = &self.version {
            v.parse::<Version>()?;
        }
        for h in &self.handlers {
            if h.name.is_empty() || h.phase.is_empty() {
                return Err(bad(format!("module {}: handler needs name and phase", self.name)));
            }
            h.flow.parse::<Direction>()?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceGroupConfig {
    pub name: String,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub engage: Vec<String>,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl ServiceGroupConfig {
    fn validate(&self, scope: &Scope<'_>) -> Result<()> {
        let level = format!("service group {}", self.name);
        scope.check_level(&level, &self.parameters, &self.policies, &self.engage)?;
        ensure_unique("service", self.services.iter().map(|s| s.name.as_str()))?;
        for s in &self.services {
            s.validate(scope)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub engage: Vec<String>,
    /// Current endpoint; defaults to the first one listed.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub operations: Vec<OperationConfig>,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl ServiceConfig {
    fn validate(&self, scope: &Scope<'_>) -> Result<()> {
        let level = format!("service {}", self.name);
        scope.check_level(&level, &self.parameters, &self.policies, &self.engage)?;
        ensure_unique("operation", self.operations.iter().map(|o| o.name.as_str()))?;
        for o in &self.operations {
            o.validate(scope, &level)?;
        }
        ensure_unique("endpoint", self.endpoints.iter().map(|e| e.name.as_str()))?;
        for e in &self.endpoints {
            e.validate(scope, &level)?;
        }
        if let Some(current) = &self.endpoint {
            if !self.endpoints.iter().any(|e| &e.name == current) {
                return Err(bad(format!("{level}: unknown endpoint {current}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationConfig {
    /// Clark notation (`{ns}local`) or a bare local name.
    pub name: String,
    #[serde(default)]
    pub mep: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub engage: Vec<String>,
    #[serde(default)]
    pub messages: Vec<MessageConfig>,
}

impl OperationConfig {
    pub(crate) fn mep(&self) -> Result<Mep> {
        match &self.mep {
            None => Ok(Mep::default()),
            Some(s) => Mep::parse(s).ok_or_else(|| bad(format!("unknown mep: {s}"))),
        }
    }

    fn validate(&self, scope: &Scope<'_>, parent: &str) -> Result<()> {
        let level = format!("{parent}/operation {}", self.name);
        scope.check_level(&level, &self.parameters, &self.policies, &self.engage)?;
        let mep = self.mep()?;
        let mut seen = HashSet::new();
        for m in &self.messages {
            let direction = m.direction()?;
            if !mep.has_direction(direction) {
                return Err(bad(format!(
                    "{level}: mep {} has no {direction} message",
                    mep.uri()
                )));
            }
            if !seen.insert(direction) {
                return Err(bad(format!("{level}: duplicate {direction} message")));
            }
            scope.check_level(&level, &m.parameters, &m.policies, &m.engage)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageConfig {
    pub direction: String,
    #[serde(default)]
    pub element: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub engage: Vec<String>,
}

impl MessageConfig {
    pub(crate) fn direction(&self) -> Result<Direction> {
        self.direction.parse()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub binding: Option<BindingConfig>,
}

impl EndpointConfig {
    fn validate(&self, scope: &Scope<'_>, parent: &str) -> Result<()> {
        let level = format!("{parent}/endpoint {}", self.name);
        scope.check_level(&level, &[], &self.policies, &[])?;
        if let Some(binding) = &self.binding {
            scope.check_level(&level, &[], &binding.policies, &[])?;
            ensure_unique(
                "binding operation",
                binding.operations.iter().map(|o| o.name.as_str()),
            )?;
            for op in &binding.operations {
                scope.check_level(&level, &[], &op.policies, &[])?;
                for m in &op.messages {
                    m.direction.parse::<Direction>()?;
                    scope.check_level(&level, &[], &m.policies, &[])?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    pub name: String,
    #[serde(rename = "type", default = "default_binding_type")]
    pub binding_type: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub operations: Vec<BindingOperationConfig>,
}

fn default_binding_type() -> String {
    "soap12".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingOperationConfig {
    pub name: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub messages: Vec<BindingMessageConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingMessageConfig {
    pub direction: String,
    #[serde(default)]
    pub policies: Vec<String>,
}
