use serde::{Deserialize, Serialize};

/// Permission required by a privileged vault entrypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Configuration and role administration
    Admin,
    /// Strategy admission, removal, upgrades and allocation targets
    Manager,
    /// Rebalance and harvest batches
    Rebalancer,
    /// Circuit breaker and forced strategy exits
    EmergencyOperator,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Admin,
        Role::Manager,
        Role::Rebalancer,
        Role::EmergencyOperator,
    ];
}
