//! AppStream component resolution and package install flow
//!
//! Backs the `appstream-handler` binary: an `appstream://<component-id>` URI
//! names a software component; the flow maps it to distribution package
//! names, resolves those against the package daemon and installs whatever
//! came back available. Same event-loop discipline as
//! [`crate::orchestrator`]: one terminal outcome, first one wins.

use crate::events::PackageEvent;
use crate::orchestrator::Outcome;
use crate::services::{PackageBackend, PackagePool};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::Receiver;
use strum::Display;
use tracing::{debug, info, warn};

/// Package flow states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FlowState {
    /// Pool not loaded yet
    Init,
    /// Resolve transaction issued, collecting package ids
    Resolving,
    /// Install transaction issued
    Installing,
    /// Terminal
    Done,
}

/// Component → packages → resolve → install state machine.
///
/// `S` is the production bridge or a test double; it plays both the AppStream
/// pool and the package daemon because both live behind the same service in
/// practice.
pub struct PackageFlow<S>
where
    S: PackagePool + PackageBackend,
{
    service: S,
    component_id: String,
    state: FlowState,
    /// name → package id for every available resolve result; a BTreeMap so
    /// duplicate resolutions of one name collapse and ordering is stable.
    resolved: BTreeMap<String, String>,
    outcome: Option<Outcome>,
}

impl<S> PackageFlow<S>
where
    S: PackagePool + PackageBackend,
{
    pub fn new(service: S, component_id: impl Into<String>) -> Self {
        Self {
            service,
            component_id: component_id.into(),
            state: FlowState::Init,
            resolved: BTreeMap::new(),
            outcome: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Load the pool, collect the component's package names and issue the
    /// resolve transaction. Terminal on any validation failure.
    pub fn start(&mut self) {
        debug_assert_eq!(self.state, FlowState::Init);
        if !self.service.load() {
            warn!("couldn't load the component pool");
            self.fail();
            return;
        }

        let components = self.service.components_by_id(&self.component_id);
        if components.is_empty() {
            warn!(component = %self.component_id, "couldn't find component");
            self.fail();
            return;
        }

        let names: BTreeSet<String> = components
            .into_iter()
            .flat_map(|c| c.package_names)
            .collect();
        if names.is_empty() {
            warn!(component = %self.component_id, "no packages to install");
            self.fail();
            return;
        }

        let names: Vec<String> = names.into_iter().collect();
        debug!(component = %self.component_id, ?names, "resolving packages");
        self.state = FlowState::Resolving;
        self.service.resolve(&names);
    }

    /// Dispatch one loop event. No-op once a terminal outcome is set.
    pub fn handle(&mut self, event: PackageEvent) {
        if self.outcome.is_some() {
            debug!(?event, "event after terminal outcome ignored");
            return;
        }
        match event {
            PackageEvent::Resolved {
                name,
                package_id,
                available,
            } => self.on_resolved(name, package_id, available),
            PackageEvent::ResolveFinished { ok } => self.on_resolve_finished(ok),
            PackageEvent::InstallFinished { ok } => self.on_install_finished(ok),
        }
    }

    /// Drain the event loop until a terminal outcome is reached and return
    /// the process exit code.
    pub fn run(&mut self, events: Receiver<PackageEvent>) -> i32 {
        while self.outcome.is_none() {
            match events.recv() {
                Ok(event) => self.handle(event),
                Err(_) => {
                    warn!("event channel closed before a terminal outcome");
                    self.fail();
                }
            }
        }
        let outcome = self.outcome.unwrap_or(Outcome::Failed);
        info!(%outcome, "handler finished");
        outcome.exit_code()
    }

    fn on_resolved(&mut self, name: String, package_id: String, available: bool) {
        if self.state != FlowState::Resolving {
            debug!(state = %self.state, "resolve result outside resolve ignored");
            return;
        }
        debug!(%name, %package_id, available, "resolved package");
        if available {
            self.resolved.insert(name, package_id);
        }
    }

    fn on_resolve_finished(&mut self, ok: bool) {
        if self.state != FlowState::Resolving {
            debug!(state = %self.state, "resolve-finished outside resolve ignored");
            return;
        }
        if !ok {
            warn!("resolve failed");
            self.fail();
            return;
        }
        if self.resolved.is_empty() {
            info!("nothing to install");
            self.finish(Outcome::NothingToDo);
            return;
        }
        let package_ids: Vec<String> = self.resolved.values().cloned().collect();
        info!(?package_ids, "installing");
        self.state = FlowState::Installing;
        self.service.install(&package_ids);
    }

    fn on_install_finished(&mut self, ok: bool) {
        if self.state != FlowState::Installing {
            debug!(state = %self.state, "install-finished outside install ignored");
            return;
        }
        info!(ok, "install finished");
        if ok {
            self.finish(Outcome::Installed);
        } else {
            self.fail();
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        self.state = FlowState::Done;
        self.outcome = Some(outcome);
    }

    fn fail(&mut self) {
        self.finish(Outcome::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Component;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum ServiceCall {
        Load,
        Resolve(Vec<String>),
        Install(Vec<String>),
    }

    #[derive(Default)]
    struct MockService {
        calls: Rc<RefCell<Vec<ServiceCall>>>,
        load_ok: bool,
        components: Vec<Component>,
    }

    impl PackagePool for MockService {
        fn load(&mut self) -> bool {
            self.calls.borrow_mut().push(ServiceCall::Load);
            self.load_ok
        }

        fn components_by_id(&self, component_id: &str) -> Vec<Component> {
            self.components
                .iter()
                .filter(|c| c.id == component_id)
                .cloned()
                .collect()
        }
    }

    impl PackageBackend for MockService {
        fn resolve(&mut self, names: &[String]) {
            self.calls
                .borrow_mut()
                .push(ServiceCall::Resolve(names.to_vec()));
        }

        fn install(&mut self, package_ids: &[String]) {
            self.calls
                .borrow_mut()
                .push(ServiceCall::Install(package_ids.to_vec()));
        }
    }

    fn component(id: &str, packages: &[&str]) -> Component {
        Component {
            id: id.into(),
            package_names: packages.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn flow_with(
        components: Vec<Component>,
    ) -> (PackageFlow<MockService>, Rc<RefCell<Vec<ServiceCall>>>) {
        let service = MockService {
            load_ok: true,
            components,
            ..MockService::default()
        };
        let calls = Rc::clone(&service.calls);
        (PackageFlow::new(service, "org.example.App"), calls)
    }

    fn install_calls(calls: &Rc<RefCell<Vec<ServiceCall>>>) -> usize {
        calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, ServiceCall::Install(_)))
            .count()
    }

    #[test]
    fn test_pool_load_failure_is_terminal() {
        let service = MockService::default(); // load_ok = false
        let mut flow = PackageFlow::new(service, "org.example.App");
        flow.start();
        assert_eq!(flow.outcome(), Some(Outcome::Failed));
    }

    #[test]
    fn test_unknown_component_is_fatal() {
        let (mut flow, calls) = flow_with(vec![component("org.other.App", &["pkg"])]);
        flow.start();
        assert_eq!(flow.outcome(), Some(Outcome::Failed));
        assert_eq!(install_calls(&calls), 0);
    }

    #[test]
    fn test_component_without_packages_is_fatal() {
        let (mut flow, calls) = flow_with(vec![component("org.example.App", &[])]);
        flow.start();
        assert_eq!(flow.outcome(), Some(Outcome::Failed));
        assert_eq!(install_calls(&calls), 0);
    }

    #[test]
    fn test_package_names_are_deduplicated_across_components() {
        let (mut flow, calls) = flow_with(vec![
            component("org.example.App", &["pkg-a", "pkg-b"]),
            component("org.example.App", &["pkg-b"]),
        ]);
        flow.start();
        assert_eq!(flow.state(), FlowState::Resolving);
        assert!(calls.borrow().contains(&ServiceCall::Resolve(vec![
            "pkg-a".into(),
            "pkg-b".into()
        ])));
    }

    #[test]
    fn test_full_flow_installs_all_available_packages() {
        let (mut flow, calls) = flow_with(vec![component("org.example.App", &["pkg-a", "pkg-b"])]);
        flow.start();

        flow.handle(PackageEvent::Resolved {
            name: "pkg-a".into(),
            package_id: "pkg-a;1.0;x86_64;repo".into(),
            available: true,
        });
        flow.handle(PackageEvent::Resolved {
            name: "pkg-b".into(),
            package_id: "pkg-b;2.0;x86_64;repo".into(),
            available: true,
        });
        flow.handle(PackageEvent::ResolveFinished { ok: true });
        assert_eq!(flow.state(), FlowState::Installing);
        assert!(calls.borrow().contains(&ServiceCall::Install(vec![
            "pkg-a;1.0;x86_64;repo".into(),
            "pkg-b;2.0;x86_64;repo".into()
        ])));

        flow.handle(PackageEvent::InstallFinished { ok: true });
        assert_eq!(flow.outcome(), Some(Outcome::Installed));
        assert_eq!(flow.outcome().unwrap().exit_code(), 0);
    }

    #[test]
    fn test_unavailable_packages_are_not_installed() {
        let (mut flow, calls) = flow_with(vec![component("org.example.App", &["pkg-a", "pkg-b"])]);
        flow.start();
        flow.handle(PackageEvent::Resolved {
            name: "pkg-a".into(),
            package_id: "pkg-a;1.0;x86_64;installed".into(),
            available: false,
        });
        flow.handle(PackageEvent::ResolveFinished { ok: true });
        assert_eq!(flow.outcome(), Some(Outcome::NothingToDo));
        assert_eq!(flow.outcome().unwrap().exit_code(), 0);
        assert_eq!(install_calls(&calls), 0);
    }

    #[test]
    fn test_resolve_failure_is_fatal() {
        let (mut flow, calls) = flow_with(vec![component("org.example.App", &["pkg-a"])]);
        flow.start();
        flow.handle(PackageEvent::ResolveFinished { ok: false });
        assert_eq!(flow.outcome(), Some(Outcome::Failed));
        assert_eq!(install_calls(&calls), 0);
    }

    #[test]
    fn test_install_failure_is_fatal() {
        let (mut flow, _calls) = flow_with(vec![component("org.example.App", &["pkg-a"])]);
        flow.start();
        flow.handle(PackageEvent::Resolved {
            name: "pkg-a".into(),
            package_id: "pkg-a;1.0;x86_64;repo".into(),
            available: true,
        });
        flow.handle(PackageEvent::ResolveFinished { ok: true });
        flow.handle(PackageEvent::InstallFinished { ok: false });
        assert_eq!(flow.outcome(), Some(Outcome::Failed));
        assert_eq!(flow.outcome().unwrap().exit_code(), 1);
    }

    #[test]
    fn test_duplicate_resolutions_collapse() {
        let (mut flow, calls) = flow_with(vec![component("org.example.App", &["pkg-a"])]);
        flow.start();
        for _ in 0..2 {
            flow.handle(PackageEvent::Resolved {
                name: "pkg-a".into(),
                package_id: "pkg-a;1.0;x86_64;repo".into(),
                available: true,
            });
        }
        flow.handle(PackageEvent::ResolveFinished { ok: true });
        assert!(calls
            .borrow()
            .contains(&ServiceCall::Install(vec!["pkg-a;1.0;x86_64;repo".into()])));
    }

    #[test]
    fn test_events_after_terminal_outcome_are_ignored() {
        let (mut flow, _calls) = flow_with(vec![component("org.example.App", &["pkg-a"])]);
        flow.start();
        flow.handle(PackageEvent::ResolveFinished { ok: false });
        assert_eq!(flow.outcome(), Some(Outcome::Failed));

        flow.handle(PackageEvent::InstallFinished { ok: true });
        assert_eq!(flow.outcome(), Some(Outcome::Failed));
    }

    #[test]
    fn test_run_drains_channel_to_exit_code() {
        let (mut flow, _calls) = flow_with(vec![component("org.example.App", &["pkg-a"])]);
        flow.start();
        let (tx, rx) = std::sync::mpsc::channel();
        tx.send(PackageEvent::Resolved {
            name: "pkg-a".into(),
            package_id: "pkg-a;1.0;x86_64;repo".into(),
            available: true,
        })
        .unwrap();
        tx.send(PackageEvent::ResolveFinished { ok: true }).unwrap();
        tx.send(PackageEvent::InstallFinished { ok: true }).unwrap();
        assert_eq!(flow.run(rx), 0);
    }
}
