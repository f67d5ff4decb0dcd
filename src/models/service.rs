use serde::{Deserialize, Serialize};

/// Read-only view of a service listing. Listing CRUD lives elsewhere; bookings
/// only reference a service and show its title and price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub provider_id: String,
    pub title: String,
    pub price: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub id: String,
    pub title: String,
    pub price: f64,
}

impl From<&Service> for ServiceSummary {
    fn from(service: &Service) -> Self {
        Self {
            id: service.id.clone(),
            title: service.title.clone(),
            price: service.price,
        }
    }
}
