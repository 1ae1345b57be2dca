pub mod config;
pub mod domain {
    pub mod gateway;
    pub mod order;
    pub mod payment;
}
pub mod eligibility;
pub mod error;
pub mod fees;
pub mod gateways;
pub mod http {
    pub mod error;
    pub mod handlers {
        pub mod gateways;
        pub mod payments;
        pub mod webhooks;
    }
    pub mod middleware {
        pub mod admin_auth;
        pub mod rate_limit;
    }
    pub mod router;
}
pub mod money;
pub mod repo {
    pub mod memory_store;
    pub mod pg_store;
    pub mod store;
}
pub mod service {
    pub mod gateway_admin;
    pub mod order_locks;
    pub mod orchestrator;
    pub mod webhook_router;
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: service::orchestrator::PaymentOrchestrator,
    pub webhook_router: service::webhook_router::WebhookRouter,
    pub gateway_admin: service::gateway_admin::GatewayAdmin,
}
