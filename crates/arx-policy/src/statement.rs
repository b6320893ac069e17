//! Policy statements and the capability interface the engine consumes.
//!
//! The document parser lives outside this crate; it hands the engine an
//! ordered list of parsed statements. The engine never depends on the
//! parser's concrete types, only on the [`PolicyStatement`] capability
//! interface. [`Record`] is the concrete value type produced by the
//! in-tree parser bindings and by tests; it composes optional
//! [`RoleIdentity`] and [`ResourceIdentity`] facets rather than
//! inheriting them, so a statement may be role-capable,
//! resource-capable, or both.

use std::collections::BTreeMap;

use arx_core::{ResourceId, RoleId};

/// Reserved annotation recording a variable's declared kind.
pub const ANNOTATION_KIND: &str = "arx/kind";

/// Reserved annotation recording a variable's declared MIME type.
pub const ANNOTATION_MIME_TYPE: &str = "arx/mime_type";

/// A role-in-role grant declared by a statement.
///
/// The flag fields mirror the document grammar, where both are
/// optional; unset flags default to `false` when the grant is staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipGrant {
    /// The member receiving the grant.
    pub member_id: RoleId,

    /// Whether the member may grant the role onward; `None` defaults to false.
    pub admin_option: Option<bool>,

    /// Whether the grant records ownership; `None` defaults to false.
    pub ownership: Option<bool>,
}

/// A privilege grant declared by a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    /// The granted privilege, e.g. `read`, `execute`.
    pub privilege: String,

    /// The role receiving the grant.
    pub role_id: RoleId,
}

/// The role facet of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleIdentity {
    /// Qualified role identifier.
    pub role_id: RoleId,
}

/// The resource facet of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentity {
    /// Qualified resource identifier.
    pub resource_id: ResourceId,
}

/// Capability interface over one parsed policy statement.
///
/// The reconciliation engine sees statements only through this trait.
/// Methods with default implementations cover statement families that
/// many kinds do not declare.
pub trait PolicyStatement: Send + Sync + std::fmt::Debug {
    /// The statement's qualified identifier.
    fn id(&self) -> &str;

    /// Whether this statement declares a role.
    fn is_role(&self) -> bool;

    /// Whether this statement declares a resource.
    fn is_resource(&self) -> bool;

    /// The declared owner, if any.
    fn owner_id(&self) -> Option<&RoleId>;

    /// Annotations declared on the resource facet.
    fn annotations(&self) -> &BTreeMap<String, String>;

    /// The statement kind (`user`, `group`, `variable`, ...), if known.
    fn kind(&self) -> Option<&str>;

    /// Role-in-role grants declared by this statement.
    fn memberships(&self) -> &[MembershipGrant] {
        &[]
    }

    /// Privilege grants declared by this statement.
    fn permits(&self) -> &[PermissionGrant] {
        &[]
    }

    /// CIDR restriction declared for the role facet, consumed only by
    /// the auxiliary-data phase.
    fn restricted_to(&self) -> &[String] {
        &[]
    }

    /// Public keys declared for the resource facet, consumed only by
    /// the auxiliary-data phase.
    fn public_keys(&self) -> &[String] {
        &[]
    }

    /// Plaintext password declared for the role facet, consumed only by
    /// the auxiliary-data phase.
    fn password(&self) -> Option<&str> {
        None
    }
}

/// Concrete statement value used by the parser bindings and tests.
#[derive(Debug, Clone, Default)]
pub struct Record {
    kind: Option<String>,
    role: Option<RoleIdentity>,
    resource: Option<ResourceIdentity>,
    owner: Option<RoleId>,
    annotations: BTreeMap<String, String>,
    memberships: Vec<MembershipGrant>,
    permits: Vec<PermissionGrant>,
    restricted_to: Vec<String>,
    public_keys: Vec<String>,
    password: Option<String>,
}

impl Record {
    /// A statement that is both role- and resource-capable, as `user`,
    /// `group`, `host`, `layer`, and `policy` declarations are.
    fn role_and_resource(kind: &str, account: &str, identifier: &str, owner: RoleId) -> Self {
        let role_id = RoleId::new(account, kind, identifier);
        Self {
            kind: Some(kind.to_string()),
            resource: Some(ResourceIdentity {
                resource_id: role_id.as_resource(),
            }),
            role: Some(RoleIdentity { role_id }),
            owner: Some(owner),
            ..Self::default()
        }
    }

    /// A resource-only statement (`variable`, `webservice`).
    fn resource_only(kind: &str, account: &str, identifier: &str, owner: RoleId) -> Self {
        Self {
            kind: Some(kind.to_string()),
            resource: Some(ResourceIdentity {
                resource_id: ResourceId::new(account, kind, identifier),
            }),
            role: None,
            owner: Some(owner),
            ..Self::default()
        }
    }

    /// Declare a user.
    #[must_use]
    pub fn user(account: &str, name: &str, owner: RoleId) -> Self {
        Self::role_and_resource("user", account, name, owner)
    }

    /// Declare a group.
    #[must_use]
    pub fn group(account: &str, name: &str, owner: RoleId) -> Self {
        Self::role_and_resource("group", account, name, owner)
    }

    /// Declare a host.
    #[must_use]
    pub fn host(account: &str, name: &str, owner: RoleId) -> Self {
        Self::role_and_resource("host", account, name, owner)
    }

    /// Declare a layer.
    #[must_use]
    pub fn layer(account: &str, name: &str, owner: RoleId) -> Self {
        Self::role_and_resource("layer", account, name, owner)
    }

    /// Declare a policy scope.
    #[must_use]
    pub fn policy(account: &str, path: &str, owner: RoleId) -> Self {
        Self::role_and_resource("policy", account, path, owner)
    }

    /// Declare a webservice endpoint.
    #[must_use]
    pub fn webservice(account: &str, path: &str, owner: RoleId) -> Self {
        Self::resource_only("webservice", account, path, owner)
    }

    /// Declare a variable.
    ///
    /// Injects the reserved `arx/kind` and `arx/mime_type` annotations
    /// recording the declared type metadata.
    #[must_use]
    pub fn variable(
        account: &str,
        name: &str,
        owner: RoleId,
        kind: &str,
        mime_type: &str,
    ) -> Self {
        let mut record = Self::resource_only("variable", account, name, owner);
        record
            .annotations
            .insert(ANNOTATION_KIND.to_string(), kind.to_string());
        record
            .annotations
            .insert(ANNOTATION_MIME_TYPE.to_string(), mime_type.to_string());
        record
    }

    /// A bare deletion target: resolves an id for `delete_statements`
    /// without declaring anything.
    #[must_use]
    pub fn deletion(id: RoleId) -> Self {
        Self {
            resource: Some(ResourceIdentity {
                resource_id: id.as_resource(),
            }),
            role: Some(RoleIdentity { role_id: id }),
            ..Self::default()
        }
    }

    /// Add an annotation to the resource facet.
    #[must_use]
    pub fn with_annotation(mut self, name: &str, value: &str) -> Self {
        self.annotations.insert(name.to_string(), value.to_string());
        self
    }

    /// Grant the role facet to a member.
    #[must_use]
    pub fn with_member(mut self, member_id: RoleId, admin_option: Option<bool>) -> Self {
        self.memberships.push(MembershipGrant {
            member_id,
            admin_option,
            ownership: None,
        });
        self
    }

    /// Grant a privilege on the resource facet to a role.
    #[must_use]
    pub fn with_permit(mut self, privilege: &str, role_id: RoleId) -> Self {
        self.permits.push(PermissionGrant {
            privilege: privilege.to_string(),
            role_id,
        });
        self
    }

    /// Restrict the role facet's credentials to CIDR ranges.
    #[must_use]
    pub fn with_restricted_to(mut self, cidrs: Vec<String>) -> Self {
        self.restricted_to = cidrs;
        self
    }

    /// Attach a public key to the resource facet.
    #[must_use]
    pub fn with_public_key(mut self, key: &str) -> Self {
        self.public_keys.push(key.to_string());
        self
    }

    /// Set an initial password on the role facet.
    #[must_use]
    pub fn with_password(mut self, plaintext: &str) -> Self {
        self.password = Some(plaintext.to_string());
        self
    }
}

impl PolicyStatement for Record {
    fn id(&self) -> &str {
        self.role
            .as_ref()
            .map(|r| r.role_id.as_str())
            .or_else(|| self.resource.as_ref().map(|r| r.resource_id.as_str()))
            .unwrap_or_default()
    }

    fn is_role(&self) -> bool {
        self.role.is_some()
    }

    fn is_resource(&self) -> bool {
        self.resource.is_some()
    }

    fn owner_id(&self) -> Option<&RoleId> {
        self.owner.as_ref()
    }

    fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }

    fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    fn memberships(&self) -> &[MembershipGrant] {
        &self.memberships
    }

    fn permits(&self) -> &[PermissionGrant] {
        &self.permits
    }

    fn restricted_to(&self) -> &[String] {
        &self.restricted_to
    }

    fn public_keys(&self) -> &[String] {
        &self.public_keys
    }

    fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}
