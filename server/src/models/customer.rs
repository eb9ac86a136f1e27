use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type CustomerId = i32;

/// A customer as seen by the ticketing core. Credentials live with the
/// external login service and never leave the `customer` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
}
