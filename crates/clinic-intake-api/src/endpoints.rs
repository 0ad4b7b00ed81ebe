//! Routes of the intake server's REST API.

/// URL builder for the intake server's routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `GET` lists, `POST` creates.
    pub fn patients(&self) -> String {
        format!("{}/api/patients", self.base)
    }

    /// `PATCH` status, `DELETE` record.
    pub fn patient(&self, id: &str) -> String {
        format!("{}/api/patients/{}", self.base, id)
    }

    pub fn prescription(&self, id: &str) -> String {
        format!("{}/api/patients/{}/prescription", self.base, id)
    }

    /// Takes `q` as a query parameter.
    pub fn search(&self) -> String {
        format!("{}/api/search", self.base)
    }

    pub fn stats(&self) -> String {
        format!("{}/api/stats", self.base)
    }

    pub fn sync(&self) -> String {
        format!("{}/api/sync", self.base)
    }
}
