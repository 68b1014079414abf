//! Role permission checks.
//!
//! A role grants `(action, resource)` pairs. `MANAGE` on a resource implies
//! every action on it, and `MANAGE` on `ALL` implies everything.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionAction {
    Create,
    Read,
    Update,
    Delete,
    Manage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionResource {
    All,
    Users,
    Roles,
    Chat,
    Whatsapp,
    KanbanBoards,
    KanbanCards,
    SalesPipeline,
    SalesOpportunities,
    Reports,
}

impl PermissionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::Create => "CREATE",
            PermissionAction::Read => "READ",
            PermissionAction::Update => "UPDATE",
            PermissionAction::Delete => "DELETE",
            PermissionAction::Manage => "MANAGE",
        }
    }
}

impl PermissionResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionResource::All => "ALL",
            PermissionResource::Users => "USERS",
            PermissionResource::Roles => "ROLES",
            PermissionResource::Chat => "CHAT",
            PermissionResource::Whatsapp => "WHATSAPP",
            PermissionResource::KanbanBoards => "KANBAN_BOARDS",
            PermissionResource::KanbanCards => "KANBAN_CARDS",
            PermissionResource::SalesPipeline => "SALES_PIPELINE",
            PermissionResource::SalesOpportunities => "SALES_OPPORTUNITIES",
            PermissionResource::Reports => "REPORTS",
        }
    }
}

impl FromStr for PermissionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(PermissionAction::Create),
            "READ" => Ok(PermissionAction::Read),
            "UPDATE" => Ok(PermissionAction::Update),
            "DELETE" => Ok(PermissionAction::Delete),
            "MANAGE" => Ok(PermissionAction::Manage),
            other => Err(format!("unknown permission action '{}'", other)),
        }
    }
}

impl FromStr for PermissionResource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL" => Ok(PermissionResource::All),
            "USERS" => Ok(PermissionResource::Users),
            "ROLES" => Ok(PermissionResource::Roles),
            "CHAT" => Ok(PermissionResource::Chat),
            "WHATSAPP" => Ok(PermissionResource::Whatsapp),
            "KANBAN_BOARDS" => Ok(PermissionResource::KanbanBoards),
            "KANBAN_CARDS" => Ok(PermissionResource::KanbanCards),
            "SALES_PIPELINE" => Ok(PermissionResource::SalesPipeline),
            "SALES_OPPORTUNITIES" => Ok(PermissionResource::SalesOpportunities),
            "REPORTS" => Ok(PermissionResource::Reports),
            other => Err(format!("unknown permission resource '{}'", other)),
        }
    }
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PermissionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub action: PermissionAction,
    pub resource: PermissionResource,
}

impl Permission {
    pub const fn new(action: PermissionAction, resource: PermissionResource) -> Self {
        Self { action, resource }
    }

    /// Parse a stored `(action, resource)` row
    pub fn parse(action: &str, resource: &str) -> Result<Self, String> {
        Ok(Self::new(action.parse()?, resource.parse()?))
    }
}

/// A permission row of a role, with its optional free-form conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub action: PermissionAction,
    pub resource: PermissionResource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Value>,
}

impl PermissionGrant {
    pub fn permission(&self) -> Permission {
        Permission::new(self.action, self.resource)
    }
}

impl From<Permission> for PermissionGrant {
    fn from(permission: Permission) -> Self {
        Self {
            action: permission.action,
            resource: permission.resource,
            conditions: None,
        }
    }
}

/// A built-in role created by the role seeding command
pub struct RoleTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub grants: &'static [Permission],
}

pub const DEFAULT_ROLES: [RoleTemplate; 3] = [
    RoleTemplate {
        name: "Super Admin",
        description: "Full access to the system",
        grants: &[Permission::new(PermissionAction::Manage, PermissionResource::All)],
    },
    RoleTemplate {
        name: "Manager",
        description: "Manages teams and resources",
        grants: &[
            Permission::new(PermissionAction::Read, PermissionResource::Users),
            Permission::new(PermissionAction::Update, PermissionResource::Users),
            Permission::new(PermissionAction::Manage, PermissionResource::KanbanBoards),
            Permission::new(PermissionAction::Manage, PermissionResource::KanbanCards),
            Permission::new(PermissionAction::Read, PermissionResource::Reports),
            Permission::new(PermissionAction::Manage, PermissionResource::Whatsapp),
        ],
    },
    RoleTemplate {
        name: "Collaborator",
        description: "Basic access to the system",
        grants: &[
            Permission::new(PermissionAction::Read, PermissionResource::KanbanBoards),
            Permission::new(PermissionAction::Create, PermissionResource::KanbanCards),
            Permission::new(PermissionAction::Update, PermissionResource::KanbanCards),
            Permission::new(PermissionAction::Read, PermissionResource::Chat),
            Permission::new(PermissionAction::Create, PermissionResource::Chat),
        ],
    },
];

pub fn is_super_admin(permissions: &[Permission]) -> bool {
    permissions
        .iter()
        .any(|p| p.action == PermissionAction::Manage && p.resource == PermissionResource::All)
}

pub fn has_manage_permission(permissions: &[Permission], resource: PermissionResource) -> bool {
    permissions
        .iter()
        .any(|p| p.action == PermissionAction::Manage && p.resource == resource)
}

pub fn check_permission(permissions: &[Permission], action: PermissionAction, resource: PermissionResource) -> bool {
    if is_super_admin(permissions) || has_manage_permission(permissions, resource) {
        return true;
    }
    permissions
        .iter()
        .any(|p| p.action == action && p.resource == resource)
}
