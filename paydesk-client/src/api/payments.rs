//! Organization payment endpoint bindings

use std::sync::Arc;

use crate::error::Result;
use crate::http::{ApiResponse, HttpClient};
use crate::request::{QueryValue, RequestDescriptor, Scalar};
use crate::types::{OrganizationPayment, Page, PaymentInput, PaymentStats, PaymentStatus, PaymentType};

const PAYMENTS_ROUTE: &str = "organization-payment/";
const STATS_ROUTE: &str = "organization-payment/stats/";

fn payment_route(id: u64) -> String {
    format!("organization-payment/{}/", id)
}

/// Filters and paging for the payment list, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentQuery {
    params: Vec<(String, QueryValue)>,
}

impl PaymentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, page: u32) -> Self {
        self.param("page", page)
    }

    pub fn page_size(self, size: u32) -> Self {
        self.param("page_size", size)
    }

    pub fn status(self, status: PaymentStatus) -> Self {
        self.param("status", status.as_str())
    }

    /// Match any of the given payment types
    pub fn payment_types(mut self, types: &[PaymentType]) -> Self {
        let values = types.iter().map(|t| Scalar::from(t.as_str())).collect();
        self.params.push(("payment_type".to_string(), QueryValue::List(values)));
        self
    }

    pub fn search(self, term: impl Into<String>) -> Self {
        self.param("search", term.into())
    }

    /// Server-side ordering, e.g. `-expense_date`
    pub fn ordering(self, field: impl Into<String>) -> Self {
        self.param("ordering", field.into())
    }

    /// Pre-formatted expansion list, sent unencoded
    pub fn expand(self, fields: impl Into<String>) -> Self {
        self.param("expand", fields.into())
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_params(self) -> Vec<(String, QueryValue)> {
        self.params
    }
}

#[derive(Clone)]
pub struct PaymentsApi {
    http: Arc<HttpClient>,
}

impl PaymentsApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    /// `GET organization-payment/`
    pub async fn list(&self, query: PaymentQuery) -> Result<Page<OrganizationPayment>> {
        let request = RequestDescriptor::new(PAYMENTS_ROUTE)
            .authenticated()
            .params(query.into_params());
        Ok(self.http.get(request).await?.data)
    }

    /// `GET organization-payment/{id}/`
    pub async fn get(&self, id: u64) -> Result<OrganizationPayment> {
        let request = RequestDescriptor::new(payment_route(id)).authenticated();
        Ok(self.http.get(request).await?.data)
    }

    /// `POST organization-payment/`
    pub async fn create(&self, input: &PaymentInput) -> Result<OrganizationPayment> {
        let request = RequestDescriptor::new(PAYMENTS_ROUTE).authenticated();
        Ok(self.http.post(request, input).await?.data)
    }

    /// `PUT organization-payment/{id}/`
    pub async fn update(&self, id: u64, input: &PaymentInput) -> Result<OrganizationPayment> {
        let request = RequestDescriptor::new(payment_route(id)).authenticated();
        Ok(self.http.put(request, input).await?.data)
    }

    /// `PATCH organization-payment/{id}/`
    pub async fn patch(&self, id: u64, input: &PaymentInput) -> Result<OrganizationPayment> {
        let request = RequestDescriptor::new(payment_route(id)).authenticated();
        Ok(self.http.patch(request, input).await?.data)
    }

    /// `DELETE organization-payment/{id}/`
    pub async fn delete(&self, id: u64) -> Result<()> {
        let request = RequestDescriptor::new(payment_route(id)).authenticated();
        let _: ApiResponse<Option<serde_json::Value>> = self.http.delete(request).await?;
        Ok(())
    }

    /// `GET organization-payment/stats/`
    pub async fn stats(&self) -> Result<PaymentStats> {
        let request = RequestDescriptor::new(STATS_ROUTE).authenticated();
        Ok(self.http.get(request).await?.data)
    }
}
