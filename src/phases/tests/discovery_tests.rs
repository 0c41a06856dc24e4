use super::*;
use crate::gateway::{METHOD_AGENT_WAIT, METHOD_SESSIONS_DELETE};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Gateway stub that resolves discovery workers by question index.
///
/// Question indices are recovered from the session key suffix
/// (`…:discovery:<n>`) at spawn time and remembered per run id.
struct DiscoveryGateway {
    log: Mutex<Vec<String>>,
    run_to_question: Mutex<HashMap<String, usize>>,
    replies: HashMap<usize, String>,
    fail_spawn_for: HashSet<usize>,
    delay_for: HashMap<usize, Duration>,
}

impl DiscoveryGateway {
    fn new(replies: HashMap<usize, String>) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            run_to_question: Mutex::new(HashMap::new()),
            replies,
            fail_spawn_for: HashSet::new(),
            delay_for: HashMap::new(),
        }
    }

    fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn position(&self, event: &str) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("event {event} missing from {:?}", self.events()))
    }
}

fn question_index(session_key: &str) -> usize {
    session_key
        .rsplit(':')
        .next()
        .and_then(|suffix| suffix.parse().ok())
        .expect("session key to end in a question index")
}

#[async_trait]
impl Gateway for DiscoveryGateway {
    async fn call(&self, method: &str, params: Value, _timeout: Option<Duration>) -> Result<Value> {
        match method {
            METHOD_AGENT => {
                let index = question_index(params["sessionKey"].as_str().unwrap());
                if self.fail_spawn_for.contains(&index) {
                    anyhow::bail!("gateway refused spawn for question {index}");
                }
                let run_id = params["idempotencyKey"].as_str().unwrap().to_string();
                self.run_to_question.lock().unwrap().insert(run_id, index);
                self.log.lock().unwrap().push(format!("spawn:{index}"));
                Ok(json!({ "accepted": true }))
            }
            METHOD_AGENT_WAIT => {
                let run_id = params["runId"].as_str().unwrap().to_string();
                let index = *self.run_to_question.lock().unwrap().get(&run_id).unwrap();
                if let Some(delay) = self.delay_for.get(&index) {
                    tokio::time::sleep(*delay).await;
                }
                self.log.lock().unwrap().push(format!("wait:{index}"));
                let reply = self.replies.get(&index).cloned().unwrap_or_default();
                Ok(json!({ "reply": reply }))
            }
            METHOD_SESSIONS_DELETE => Ok(json!({ "deleted": true })),
            other => anyhow::bail!("unexpected method {other}"),
        }
    }

    async fn read_latest_assistant_reply(&self, _session_key: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

fn plan_with_questions(questions: &[&str]) -> WorkflowPlan {
    WorkflowPlan {
        intent: "investigate".to_string(),
        scope: "repo".to_string(),
        discovery_questions: questions.iter().map(|q| q.to_string()).collect(),
        constraints: vec![],
        success_criteria: vec![],
        estimated_complexity: "low".to_string(),
    }
}

fn scope() -> SessionScope {
    SessionScope::new("w1".to_string(), "main".to_string())
}

fn structured_reply(summary: &str, findings: &[&str]) -> String {
    let payload = json!({ "summary": summary, "findings": findings });
    format!("Done.\n```json\n{payload}\n```")
}

#[tokio::test]
async fn test_three_questions_at_max_parallel_two_run_in_batches_of_two_then_one() {
    let gateway = Arc::new(DiscoveryGateway::new(HashMap::from([
        (0, structured_reply("a0", &[])),
        (1, structured_reply("a1", &[])),
        (2, structured_reply("a2", &[])),
    ])));
    let results = run_discovery_phase(
        Arc::clone(&gateway) as Arc<dyn Gateway>,
        &scope(),
        &plan_with_questions(&["Q1", "Q2", "Q3"]),
        &DiscoveryConfig::default().with_max_parallel(2),
    )
    .await;

    // Batch 2 spawns only after batch 1's barrier fully resolves.
    assert!(gateway.position("spawn:2") > gateway.position("wait:0"));
    assert!(gateway.position("spawn:2") > gateway.position("wait:1"));
    // Both batch-1 spawns precede either batch-1 wait.
    assert!(gateway.position("spawn:0") < gateway.position("wait:0"));
    assert!(gateway.position("spawn:1") < gateway.position("wait:0"));
    assert!(gateway.position("spawn:1") < gateway.position("wait:1"));

    // Results preserve question order.
    let questions: Vec<&str> = results.iter().map(|r| r.question.as_str()).collect();
    assert_eq!(questions, vec!["Q1", "Q2", "Q3"]);
    assert!(results.iter().all(|r| r.status == DiscoveryStatus::Ok));
    assert_eq!(results[2].findings, "a2");
}

#[tokio::test]
async fn test_empty_question_list_is_a_no_op() {
    let gateway = Arc::new(DiscoveryGateway::new(HashMap::new()));
    let results = run_discovery_phase(
        Arc::clone(&gateway) as Arc<dyn Gateway>,
        &scope(),
        &plan_with_questions(&[]),
        &DiscoveryConfig::default(),
    )
    .await;
    assert!(results.is_empty());
    assert!(gateway.events().is_empty());
}

#[tokio::test]
async fn test_spawn_failure_records_error_and_skips_the_barrier() {
    let mut gateway = DiscoveryGateway::new(HashMap::from([
        (0, structured_reply("a0", &[])),
        (2, structured_reply("a2", &[])),
    ]));
    gateway.fail_spawn_for.insert(1);
    let gateway = Arc::new(gateway);

    let results = run_discovery_phase(
        Arc::clone(&gateway) as Arc<dyn Gateway>,
        &scope(),
        &plan_with_questions(&["Q1", "Q2", "Q3"]),
        &DiscoveryConfig::default().with_max_parallel(3),
    )
    .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[1].status, DiscoveryStatus::Error);
    assert!(results[1].findings.contains("spawn failed"));
    assert!(results[1].key_insights.is_empty());
    // The failed question never entered the barrier.
    assert!(!gateway.events().contains(&"wait:1".to_string()));
    assert_eq!(results[0].status, DiscoveryStatus::Ok);
    assert_eq!(results[2].status, DiscoveryStatus::Ok);
}

#[tokio::test(start_paused = true)]
async fn test_slow_worker_times_out_without_stalling_its_batch() {
    let mut gateway = DiscoveryGateway::new(HashMap::from([
        (0, structured_reply("a0", &[])),
        (1, structured_reply("a1", &[])),
    ]));
    gateway.delay_for.insert(0, Duration::from_secs(600));
    let gateway = Arc::new(gateway);

    let results = run_discovery_phase(
        Arc::clone(&gateway) as Arc<dyn Gateway>,
        &scope(),
        &plan_with_questions(&["Q1", "Q2"]),
        &DiscoveryConfig::default().with_question_timeout(Duration::from_secs(120)),
    )
    .await;

    assert_eq!(results[0].status, DiscoveryStatus::Timeout);
    assert_eq!(results[1].status, DiscoveryStatus::Ok);
    assert_eq!(results[1].findings, "a1");
}

#[tokio::test]
async fn test_key_insights_cap_at_ten() {
    let findings: Vec<String> = (0..13).map(|i| format!("finding {i}")).collect();
    let findings_refs: Vec<&str> = findings.iter().map(String::as_str).collect();
    let gateway = Arc::new(DiscoveryGateway::new(HashMap::from([(
        0,
        structured_reply("lots found", &findings_refs),
    )])));

    let results = run_discovery_phase(
        Arc::clone(&gateway) as Arc<dyn Gateway>,
        &scope(),
        &plan_with_questions(&["Q1"]),
        &DiscoveryConfig::default(),
    )
    .await;

    assert_eq!(results[0].key_insights.len(), MAX_KEY_INSIGHTS);
    assert_eq!(results[0].key_insights[0], "finding 0");
    assert_eq!(results[0].findings, "lots found");
}

#[tokio::test]
async fn test_prose_reply_becomes_findings_with_no_insights() {
    let gateway = Arc::new(DiscoveryGateway::new(HashMap::from([(
        0,
        "I looked around and found nothing structured.".to_string(),
    )])));
    let results = run_discovery_phase(
        Arc::clone(&gateway) as Arc<dyn Gateway>,
        &scope(),
        &plan_with_questions(&["Q1"]),
        &DiscoveryConfig::default(),
    )
    .await;

    assert_eq!(results[0].status, DiscoveryStatus::Ok);
    assert_eq!(
        results[0].findings,
        "I looked around and found nothing structured."
    );
    assert!(results[0].key_insights.is_empty());
}

#[test]
fn test_default_config_matches_contract() {
    let config = DiscoveryConfig::default();
    assert_eq!(config.max_parallel, 3);
    assert_eq!(config.question_timeout, Duration::from_secs(120));
}
