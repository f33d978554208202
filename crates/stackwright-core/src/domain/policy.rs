//! Least-privilege access policies for task execution roles.

use serde::Serialize;

use crate::domain::template::TaskDefinition;

pub const POLICY_VERSION: &str = "2012-10-17";

/// Managed policy attached to every execution role.
pub const EXECUTION_BASELINE_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";

/// Actions needed to read a secret value at container start.
pub const SECRET_READ_ACTIONS: [&str; 3] = [
    "secretsmanager:GetSecretValue",
    "ssm:GetParameters",
    "kms:Decrypt",
];

const TASK_SERVICE_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Principal {
    pub service: String,
}

impl PolicyDocument {
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }

    /// Trust policy letting container tasks assume a role.
    pub fn task_trust() -> Self {
        Self::new(vec![PolicyStatement {
            effect: Effect::Allow,
            principal: Some(Principal {
                service: TASK_SERVICE_PRINCIPAL.to_string(),
            }),
            action: vec!["sts:AssumeRole".to_string()],
            resource: Vec::new(),
        }])
    }

    /// Every resource locator granted by this document, in statement order.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.statement
            .iter()
            .flat_map(|s| s.resource.iter().map(String::as_str))
    }
}

/// Derive a read policy covering every secret and registry credential the
/// given task definitions reference.
///
/// Locators are deduplicated in first-seen order. Returns `None` when nothing
/// is referenced; callers must not attach an empty policy.
pub fn synthesize<'a>(
    task_definitions: impl IntoIterator<Item = &'a TaskDefinition>,
) -> Option<PolicyDocument> {
    let mut locators: Vec<String> = Vec::new();
    let mut push = |locator: &str| {
        if !locators.iter().any(|l| l == locator) {
            locators.push(locator.to_string());
        }
    };

    for task_definition in task_definitions {
        for container in &task_definition.container_definitions {
            for secret in &container.secrets {
                push(&secret.value_from);
            }
            if let Some(credentials) = &container.repository_credentials {
                push(&credentials.credentials_parameter);
            }
        }
    }

    if locators.is_empty() {
        return None;
    }

    Some(PolicyDocument::new(vec![PolicyStatement {
        effect: Effect::Allow,
        principal: None,
        action: SECRET_READ_ACTIONS.iter().map(|a| a.to_string()).collect(),
        resource: locators,
    }]))
}
