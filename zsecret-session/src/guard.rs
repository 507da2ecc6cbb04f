//! Route guard for protected views.

use serde::{Deserialize, Serialize};

use crate::config::RouteConfig;
use crate::session::{SessionManager, SessionState};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    Render,
    /// Connection in flight; show a loading indicator.
    Loading,
    Redirect {
        #[serde(rename = "redirectTo")]
        to: String,
    },
}

#[derive(Clone, Debug)]
pub struct RouteGuard {
    routes: RouteConfig,
}

impl RouteGuard {
    pub fn new(routes: RouteConfig) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    /// `/dashboard` protects `/dashboard` and `/dashboard/...`, not `/dashboards`.
    pub fn is_protected(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        self.routes.protected_prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    /// Pure decision for `state` at `path`.
    pub fn decide(&self, state: SessionState, path: &str) -> GuardDecision {
        if !self.is_protected(path) {
            return GuardDecision::Render;
        }
        match state {
            SessionState::Authenticated => GuardDecision::Render,
            SessionState::Connecting => GuardDecision::Loading,
            SessionState::Disconnected | SessionState::Error => GuardDecision::Redirect {
                to: self.routes.connect_path.clone(),
            },
        }
    }

    /// Decide for the manager's current session, recording `path` as the
    /// redirect intent when the user is sent to connect.
    pub async fn evaluate(&self, manager: &SessionManager, path: &str) -> GuardDecision {
        let state = manager.current_session().await.state;
        let decision = self.decide(state, path);
        if let GuardDecision::Redirect { to } = &decision {
            tracing::debug!(path, redirect_to = %to, "redirecting to wallet connect");
            manager.remember_intent(path).await;
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::BalanceAggregator;
    use crate::config::SessionConfig;
    use crate::connector::{DemoConnector, WalletConnector, WalletKind};
    use crate::error::ConnectError;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;
    use zsecret_common::WalletAddress;

    fn guard() -> RouteGuard {
        RouteGuard::new(RouteConfig::default())
    }

    fn manager() -> SessionManager {
        SessionManager::new(
            BalanceAggregator::new(Vec::new(), Duration::from_secs(1)),
            SessionConfig::default(),
        )
    }

    #[test]
    fn protected_prefixes_match_whole_segments() {
        let guard = guard();
        assert!(guard.is_protected("/dashboard"));
        assert!(guard.is_protected("/freelancer/dashboard"));
        assert!(guard.is_protected("/client/projects?tab=open"));
        assert!(!guard.is_protected("/dashboards"));
        assert!(!guard.is_protected("/"));
        assert!(!guard.is_protected("/connect-wallet"));
    }

    #[test]
    fn decisions_by_state() {
        let guard = guard();
        let path = "/client/projects";
        assert_eq!(guard.decide(SessionState::Authenticated, path), GuardDecision::Render);
        assert_eq!(guard.decide(SessionState::Connecting, path), GuardDecision::Loading);
        for state in [SessionState::Disconnected, SessionState::Error] {
            assert_eq!(
                guard.decide(state, path),
                GuardDecision::Redirect {
                    to: "/connect-wallet".into()
                }
            );
        }
        assert_eq!(guard.decide(SessionState::Disconnected, "/about"), GuardDecision::Render);
    }

    #[test]
    fn decision_wire_shape() {
        let redirect = GuardDecision::Redirect {
            to: "/connect-wallet".into(),
        };
        assert_eq!(
            serde_json::to_value(&redirect).unwrap(),
            serde_json::json!({"decision": "redirect", "redirectTo": "/connect-wallet"})
        );
        assert_eq!(
            serde_json::to_value(GuardDecision::Loading).unwrap(),
            serde_json::json!({"decision": "loading"})
        );
    }

    #[tokio::test]
    async fn redirect_round_trip_resumes_once() {
        let guard = guard();
        let manager = manager();

        let decision = guard.evaluate(&manager, "/freelancer/dashboard").await;
        assert!(matches!(decision, GuardDecision::Redirect { .. }));

        let outcome = manager
            .connect(Arc::new(DemoConnector::default()))
            .await
            .unwrap();
        assert_eq!(outcome.resume_to, "/freelancer/dashboard");
        assert_eq!(manager.take_intent().await, None);
        assert_eq!(
            guard.evaluate(&manager, "/freelancer/dashboard").await,
            GuardDecision::Render
        );

        let again = manager
            .connect(Arc::new(DemoConnector::default()))
            .await
            .unwrap();
        assert_eq!(again.resume_to, "/dashboard");
    }

    struct PendingConnector(Arc<Notify>);

    #[async_trait]
    impl WalletConnector for PendingConnector {
        fn kind(&self) -> WalletKind {
            WalletKind::ZcashDemo
        }

        async fn connect(&self) -> Result<WalletAddress, ConnectError> {
            self.0.notified().await;
            Ok(WalletAddress::new("zs1pending"))
        }
    }

    #[tokio::test]
    async fn never_renders_or_redirects_while_connecting() {
        let guard = guard();
        let manager = manager();
        let mut events = manager.subscribe();
        let gate = Arc::new(Notify::new());

        let pending = {
            let manager = manager.clone();
            let connector = Arc::new(PendingConnector(gate.clone()));
            tokio::spawn(async move { manager.connect(connector).await })
        };
        events.recv().await.unwrap();

        assert_eq!(
            guard.evaluate(&manager, "/dashboard").await,
            GuardDecision::Loading
        );
        assert_eq!(manager.take_intent().await, None);

        gate.notify_one();
        tokio_test::assert_ok!(pending.await.unwrap());
        assert_eq!(
            guard.evaluate(&manager, "/dashboard").await,
            GuardDecision::Render
        );
    }
}
