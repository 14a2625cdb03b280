//! Client → organization → app scoping.
//!
//! [`Fly`] owns the shared client context. [`OrgScope`] and [`AppScope`] are
//! light values borrowing it, so narrowing the scope never copies credentials.

use std::sync::Arc;

use fly_api::{
    App, ClientConfig, CreateAppRequest, FlyClient, ListAppsResponse, MachineConfig, StatusCode,
    Transport,
};
use tracing::{Span, info};

use crate::batch::{BatchCoordinator, BatchReport};
use crate::config::OrchestratorConfig;
use crate::identity::{AppRef, MachineIdentity};
use crate::lifecycle::{CreateOptions, LifecycleController};
use crate::record::MachineRecord;
use crate::sort::{AppSortKey, MachineSortKey};
use crate::{AppOp, Error, Result, check};

/// Root handle: transport, lifecycle controller and batch coordinator.
#[derive(Clone)]
pub struct Fly {
    controller: LifecycleController,
}

impl Fly {
    pub fn new(transport: Arc<dyn Transport>, config: OrchestratorConfig) -> Self {
        Self {
            controller: LifecycleController::new(transport, config),
        }
    }

    /// Build on top of a reqwest-backed [`FlyClient`].
    pub fn connect(client: ClientConfig, config: OrchestratorConfig) -> Result<Self> {
        let transport = FlyClient::new(client)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.controller = self.controller.with_span(span);
        self
    }

    pub fn machines(&self) -> &LifecycleController {
        &self.controller
    }

    pub fn batch(&self) -> BatchCoordinator {
        BatchCoordinator::new(self.controller.clone())
    }

    pub fn org(&self, slug: impl Into<String>) -> OrgScope<'_> {
        OrgScope {
            fly: self,
            slug: slug.into(),
        }
    }

    fn transport(&self) -> &Arc<dyn Transport> {
        self.controller.transport()
    }
}

pub struct OrgScope<'a> {
    fly: &'a Fly,
    slug: String,
}

impl<'a> OrgScope<'a> {
    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn app(&self, name: impl Into<String>) -> AppScope<'a> {
        AppScope {
            fly: self.fly,
            app: AppRef::new(self.slug.clone(), name),
        }
    }

    pub async fn list_apps(&self, sort: AppSortKey) -> Result<Vec<App>> {
        let resp = self
            .fly
            .transport()
            .get("/apps", &[("org_slug", self.slug.clone())])
            .await?;
        let resp = check(resp, StatusCode::OK, |status, body| Error::ListAppsFailed {
            org: self.slug.clone(),
            status,
            body,
        })?;

        let mut apps = resp.json::<ListAppsResponse>()?.apps;
        sort.sort(&mut apps);
        Ok(apps)
    }

    /// Like [`Self::list_apps`], with the key given by name.
    pub async fn list_apps_by(&self, sort_key: &str) -> Result<Vec<App>> {
        let sort: AppSortKey = sort_key.parse()?;
        self.list_apps(sort).await
    }

    pub async fn create_app(&self, name: &str, network: Option<&str>) -> Result<AppScope<'a>> {
        let req = CreateAppRequest {
            app_name: name.to_string(),
            org_slug: self.slug.clone(),
            network: network.map(str::to_string),
        };
        let body = serde_json::to_value(&req)?;
        let resp = self.fly.transport().post("/apps", Some(&body)).await?;
        check(resp, StatusCode::CREATED, |status, body| Error::AppOperationFailed {
            op: AppOp::Create,
            app: name.to_string(),
            status,
            body,
        })?;

        info!(org = %self.slug, app = name, "app created");
        Ok(self.app(name))
    }
}

pub struct AppScope<'a> {
    fly: &'a Fly,
    app: AppRef,
}

impl AppScope<'_> {
    pub fn app_ref(&self) -> &AppRef {
        &self.app
    }

    pub fn machine(&self, machine_id: impl Into<String>) -> MachineIdentity {
        self.app.machine(machine_id)
    }

    pub fn new_machine(&self) -> MachineIdentity {
        self.app.unassigned_machine()
    }

    pub async fn inspect(&self) -> Result<App> {
        let resp = self.fly.transport().get(&self.app.path(), &[]).await?;
        let resp = check(resp, StatusCode::OK, |status, body| {
            self.app_failed(AppOp::Inspect, status, body)
        })?;
        Ok(resp.json()?)
    }

    pub async fn delete(&self) -> Result<()> {
        let resp = self.fly.transport().delete(&self.app.path()).await?;
        check(resp, StatusCode::ACCEPTED, |status, body| {
            self.app_failed(AppOp::Delete, status, body)
        })?;
        info!(app = %self.app, "app deleted");
        Ok(())
    }

    pub async fn list_machines(
        &self,
        regions: &[String],
        sort: MachineSortKey,
    ) -> Result<Vec<MachineRecord>> {
        let mut machines = self.fly.machines().list_machines(&self.app, regions).await?;
        sort.sort(&mut machines);
        Ok(machines)
    }

    pub async fn create_machine(
        &self,
        config: &MachineConfig,
        opts: CreateOptions,
    ) -> Result<MachineRecord> {
        self.fly
            .machines()
            .create(&self.new_machine(), config, opts)
            .await
    }

    pub async fn destroy_all(
        &self,
        machine_ids: &[String],
        discover_all: bool,
    ) -> Result<BatchReport> {
        self.fly
            .batch()
            .destroy_all(&self.app, machine_ids, discover_all)
            .await
    }

    fn app_failed(&self, op: AppOp, status: StatusCode, body: String) -> Error {
        Error::AppOperationFailed {
            op,
            app: self.app.app_name().to_string(),
            status,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, machine_json};
    use fly_api::Method;
    use serde_json::json;

    fn setup() -> (Arc<MockTransport>, Fly) {
        let mock = Arc::new(MockTransport::default());
        let fly = Fly::new(mock.clone(), OrchestratorConfig::default());
        (mock, fly)
    }

    #[tokio::test]
    async fn scopes_share_the_client_context() {
        let (mock, fly) = setup();
        mock.on(Method::GET, "/apps/demo/machines/m1", 200, machine_json("m1", "stopped", "iad"));

        let org = fly.org("acme");
        let app = org.app("demo");
        let machine = app.machine("m1");
        assert_eq!(machine.org_slug(), "acme");
        assert_eq!(machine.app_name(), "demo");

        fly.machines().stop(&machine).await.unwrap();
        assert_eq!(mock.labels(), vec!["GET /apps/demo/machines/m1"]);
    }

    #[tokio::test]
    async fn list_apps_sorts_and_rejects_unknown_keys_up_front() {
        let (mock, fly) = setup();
        mock.on(
            Method::GET,
            "/apps",
            200,
            json!({
                "total_apps": 2,
                "apps": [
                    { "name": "web", "machine_count": 4, "network": "default" },
                    { "name": "api", "machine_count": 9, "network": "default" }
                ]
            }),
        );
        let org = fly.org("acme");

        assert!(matches!(
            org.list_apps_by("owner").await,
            Err(Error::InvalidSortKey(_))
        ));
        assert!(mock.calls().is_empty());

        let apps = org.list_apps_by("machine_count").await.unwrap();
        let names: Vec<&str> = apps.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["web", "api"]);
        assert_eq!(mock.calls()[0].query_value("org_slug"), Some("acme"));
    }

    #[tokio::test]
    async fn list_apps_failure_names_the_org() {
        let (mock, fly) = setup();
        mock.on(Method::GET, "/apps", 403, json!({ "error": "forbidden" }));

        let err = fly.org("acme").list_apps(AppSortKey::Name).await.unwrap_err();
        assert!(matches!(
            err,
            Error::ListAppsFailed { ref org, status, .. }
                if org == "acme" && status == StatusCode::FORBIDDEN
        ));
    }

    #[tokio::test]
    async fn app_crud_checks_resource_specific_codes() {
        let (mock, fly) = setup();
        mock.on(Method::POST, "/apps", 201, json!({ "id": "app_1", "created_at": 0 }));
        mock.on(Method::DELETE, "/apps/demo", 202, json!({}));
        mock.on(
            Method::GET,
            "/apps/demo",
            200,
            json!({ "name": "demo", "status": "deployed", "organization": { "slug": "acme" } }),
        );

        let org = fly.org("acme");
        let app = org.create_app("demo", Some("default")).await.unwrap();
        assert_eq!(mock.calls()[0].body.as_ref().unwrap()["org_slug"], "acme");

        let details = app.inspect().await.unwrap();
        assert_eq!(details.status.as_deref(), Some("deployed"));
        app.delete().await.unwrap();

        // A machine-style 200 is not success for app deletion.
        let (mock, fly) = setup();
        mock.on(Method::DELETE, "/apps/demo", 200, json!({}));
        let err = fly.org("acme").app("demo").delete().await.unwrap_err();
        assert!(matches!(
            err,
            Error::AppOperationFailed { op: AppOp::Delete, status, .. } if status == StatusCode::OK
        ));
    }

    #[tokio::test]
    async fn app_scope_lists_sorted_machines() {
        let (mock, fly) = setup();
        mock.on(
            Method::GET,
            "/apps/demo/machines",
            200,
            json!([
                machine_json("b", "started", "ord"),
                machine_json("a", "stopped", "ams"),
            ]),
        );

        let app = fly.org("acme").app("demo");
        let machines = app.list_machines(&[], MachineSortKey::Region).await.unwrap();
        let ids: Vec<&str> = machines.iter().map(|m| m.id()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(machines[0].identity.org_slug(), "acme");
    }
}
