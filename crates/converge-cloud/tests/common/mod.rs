use async_trait::async_trait;
use chrono::Utc;
use converge_cloud::{
    Action, ActionErrorPayload, ActionSource, ActionStatus, ApiError, CloudError, CreateFirewall,
    Created, Direction, Firewall, FirewallClient, FirewallRule, FirewallUpdate, Protocol,
    ResourceLookup, Result, RuleSpec,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A call made against the fake provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetById(u64),
    GetByName(String),
    GetAction(u64),
    Create(String),
    Update(u64, &'static str),
    SetRules(u64),
    Delete(u64),
}

impl Call {
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Call::Create(_) | Call::Update(..) | Call::SetRules(_) | Call::Delete(_)
        )
    }
}

#[derive(Default)]
struct State {
    firewalls: Vec<Firewall>,
    next_id: u64,
    calls: Vec<Call>,
    /// Actions returned by the next create / set_rules / delete call
    pending_actions: Vec<Action>,
    /// Successive records returned when an action is polled; the last one sticks
    action_polls: HashMap<u64, VecDeque<Action>>,
    /// Number of upcoming deletes rejected as "still in use"
    delete_conflicts: u32,
    create_error: Option<ApiError>,
}

/// In-memory provider that records every call
pub struct FakeClient {
    state: Mutex<State>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 100,
                ..Default::default()
            }),
        }
    }

    pub fn with_firewall(self, firewall: Firewall) -> Self {
        self.state.lock().unwrap().firewalls.push(firewall);
        self
    }

    /// Make the next mutation return `action`, then report `polls` in order
    pub fn with_action(self, action: Action, polls: Vec<Action>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.action_polls.insert(action.id, polls.into_iter().collect());
            state.pending_actions.push(action);
        }
        self
    }

    pub fn with_delete_conflicts(self, count: u32) -> Self {
        self.state.lock().unwrap().delete_conflicts = count;
        self
    }

    pub fn with_create_error(self, error: ApiError) -> Self {
        self.state.lock().unwrap().create_error = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn firewalls(&self) -> Vec<Firewall> {
        self.state.lock().unwrap().firewalls.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ResourceLookup for FakeClient {
    type Resource = Firewall;

    fn kind(&self) -> &str {
        "firewall"
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<Firewall>> {
        self.record(Call::GetById(id));
        Ok(self.firewalls().into_iter().find(|f| f.id == id))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Firewall>> {
        self.record(Call::GetByName(name.to_string()));
        Ok(self.firewalls().into_iter().find(|f| f.name == name))
    }
}

#[async_trait]
impl ActionSource for FakeClient {
    async fn get_action(&self, id: u64) -> Result<Action> {
        self.record(Call::GetAction(id));
        let mut state = self.state.lock().unwrap();
        let polls = state
            .action_polls
            .get_mut(&id)
            .ok_or_else(|| CloudError::Api(ApiError::new("not_found", "action not found")))?;
        let next = if polls.len() > 1 {
            polls.pop_front()
        } else {
            polls.front().cloned()
        };
        next.ok_or_else(|| CloudError::Api(ApiError::new("not_found", "action not found")))
    }
}

#[async_trait]
impl FirewallClient for FakeClient {
    async fn create(&self, request: &CreateFirewall) -> Result<Created> {
        self.record(Call::Create(request.name.clone()));
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.create_error.take() {
            return Err(CloudError::Api(error));
        }

        state.next_id += 1;
        let firewall = Firewall {
            id: state.next_id,
            name: request.name.clone(),
            labels: request.labels.clone().unwrap_or_default(),
            rules: request.rules.clone().unwrap_or_default(),
            applied_to: Vec::new(),
            created: Some(Utc::now()),
        };
        state.firewalls.push(firewall.clone());
        let actions = std::mem::take(&mut state.pending_actions);
        Ok(Created { firewall, actions })
    }

    async fn update(&self, id: u64, update: &FirewallUpdate) -> Result<Firewall> {
        self.record(Call::Update(id, update.field()));
        let mut state = self.state.lock().unwrap();
        let firewall = state
            .firewalls
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| CloudError::Api(ApiError::new("not_found", "firewall not found")))?;
        match update {
            FirewallUpdate::Name(name) => firewall.name = name.clone(),
            FirewallUpdate::Labels(labels) => firewall.labels = labels.clone(),
        }
        Ok(firewall.clone())
    }

    async fn set_rules(&self, id: u64, rules: &[FirewallRule]) -> Result<Vec<Action>> {
        self.record(Call::SetRules(id));
        let mut state = self.state.lock().unwrap();
        let firewall = state
            .firewalls
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| CloudError::Api(ApiError::new("not_found", "firewall not found")))?;
        firewall.rules = rules.to_vec();
        Ok(std::mem::take(&mut state.pending_actions))
    }

    async fn delete(&self, id: u64) -> Result<Option<Action>> {
        self.record(Call::Delete(id));
        let mut state = self.state.lock().unwrap();
        if state.delete_conflicts > 0 {
            state.delete_conflicts -= 1;
            return Err(CloudError::Api(ApiError::new(
                "resource_in_use",
                format!("firewall with ID {} is still in use", id),
            )));
        }
        state.firewalls.retain(|f| f.id != id);
        Ok(state.pending_actions.pop())
    }
}

pub fn firewall(id: u64, name: &str) -> Firewall {
    Firewall {
        id,
        name: name.to_string(),
        labels: Default::default(),
        rules: Vec::new(),
        applied_to: Vec::new(),
        created: Some(Utc::now()),
    }
}

pub fn labels(pairs: &[(&str, &str)]) -> converge_cloud::Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn tcp_in(port: &str) -> RuleSpec {
    RuleSpec {
        direction: Some(Direction::In),
        protocol: Some(Protocol::Tcp),
        port: Some(port.to_string()),
        source_ips: Some(vec!["0.0.0.0/0".to_string(), "::/0".to_string()]),
        destination_ips: None,
        description: Some(format!("allow {}", port)),
    }
}

pub fn action(id: u64, status: ActionStatus, progress: u32) -> Action {
    Action {
        id,
        command: "set_firewall_rules".to_string(),
        status,
        progress,
        started: Utc::now(),
        finished: (status != ActionStatus::Running).then(Utc::now),
        resources: Vec::new(),
        error: (status == ActionStatus::Error).then(|| ActionErrorPayload {
            code: "action_failed".to_string(),
            message: "rules could not be applied".to_string(),
        }),
    }
}
