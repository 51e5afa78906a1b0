//! Sample in-process services for the demo gateway.
//!
//! Small email and calendar backends with canned data, enough to exercise
//! every gateway operation (including prompting) without real accounts.

use async_trait::async_trait;
use mcpweb_gateway::{
    GatewayContext, GatewayError, InlineBackend, PromptAction, PromptRequest, Result,
};
use serde_json::{json, Value};

pub struct EmailDemo {
    threads: Vec<Value>,
}

impl Default for EmailDemo {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailDemo {
    pub fn new() -> Self {
        Self {
            threads: vec![
                json!({
                    "thread_id": "thread_001",
                    "subject": "Project Update Meeting",
                    "participants": ["alice@company.com", "bob@company.com"],
                    "unread_count": 2,
                    "content": "Can we schedule a meeting for next week to discuss the project updates?"
                }),
                json!({
                    "thread_id": "thread_002",
                    "subject": "Budget Review Q1",
                    "participants": ["manager@company.com", "finance@company.com"],
                    "unread_count": 0,
                    "content": "Please review the Q1 budget numbers. Feedback is needed by Friday."
                }),
            ],
        }
    }

    fn thread(&self, id: &str) -> Option<&Value> {
        self.threads
            .iter()
            .find(|t| t["thread_id"].as_str() == Some(id))
    }
}

#[async_trait]
impl InlineBackend for EmailDemo {
    fn instructions(&self) -> String {
        "Email management service with thread, search, and reply capabilities. \
         Read /inbox for all threads and /thread/{id} for one thread; use \
         reply_thread or archive_thread actions on a thread."
            .to_string()
    }

    fn resources(&self) -> Vec<String> {
        let mut resources = vec!["/inbox".to_string()];
        resources.extend(
            self.threads
                .iter()
                .filter_map(|t| t["thread_id"].as_str())
                .map(|id| format!("/thread/{id}")),
        );
        resources
    }

    async fn read(&self, path: &str, _ctx: &GatewayContext) -> Result<Value> {
        if path == "/inbox" {
            return Ok(json!({
                "inbox": {
                    "total_threads": self.threads.len(),
                    "threads": self.threads,
                }
            }));
        }
        if let Some(id) = path.strip_prefix("/thread/") {
            return self.thread(id).cloned().ok_or_else(|| GatewayError::Protocol {
                service: "email".to_string(),
                details: format!("thread '{id}' not found"),
            });
        }
        Err(GatewayError::Protocol {
            service: "email".to_string(),
            details: format!("no resource at {path}"),
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let needle = query.to_lowercase();
        Ok(self
            .threads
            .iter()
            .filter(|t| {
                let subject = t["subject"].as_str().unwrap_or_default().to_lowercase();
                let participants = t["participants"]
                    .as_array()
                    .map(|p| {
                        p.iter()
                            .filter_map(Value::as_str)
                            .any(|s| s.to_lowercase().contains(&needle))
                    })
                    .unwrap_or(false);
                subject.contains(&needle) || participants
            })
            .filter_map(|t| t["thread_id"].as_str())
            .map(|id| format!("/thread/{id}"))
            .collect())
    }

    async fn invoke(&self, action: &str, path: &str, ctx: &GatewayContext) -> Result<Value> {
        let Some(thread_id) = path.strip_prefix("/thread/") else {
            return Err(GatewayError::Protocol {
                service: "email".to_string(),
                details: format!("actions apply to /thread/{{id}}, got {path}"),
            });
        };
        if self.thread(thread_id).is_none() {
            return Err(GatewayError::Protocol {
                service: "email".to_string(),
                details: format!("thread '{thread_id}' not found"),
            });
        }

        match action {
            "reply_thread" => {
                let outcome = ctx
                    .prompt(PromptRequest {
                        message: format!("Compose a reply to thread {thread_id}"),
                        schema: json!({
                            "type": "object",
                            "properties": {
                                "recipients": {
                                    "type": "string",
                                    "description": "Recipients (comma-separated)"
                                },
                                "content": {
                                    "type": "string",
                                    "description": "Reply content"
                                },
                                "send_immediately": {
                                    "type": "boolean",
                                    "description": "Send now or save as draft"
                                }
                            },
                            "required": ["recipients"]
                        }),
                    })
                    .await?;
                match outcome.action {
                    PromptAction::Accept => Ok(json!({
                        "status": "sent",
                        "thread_id": thread_id,
                        "reply": outcome.content,
                    })),
                    PromptAction::Decline => Ok(json!({"status": "declined"})),
                    PromptAction::Cancel => Ok(json!({"status": "cancelled"})),
                }
            }
            "archive_thread" => Ok(json!({
                "status": "archived",
                "thread_id": thread_id,
            })),
            other => Err(GatewayError::Protocol {
                service: "email".to_string(),
                details: format!("unknown action '{other}'"),
            }),
        }
    }
}

pub struct CalendarDemo {
    events: Vec<Value>,
}

impl Default for CalendarDemo {
    fn default() -> Self {
        Self::new()
    }
}

impl CalendarDemo {
    pub fn new() -> Self {
        Self {
            events: vec![
                json!({
                    "event_id": "evt_001",
                    "title": "Team Standup",
                    "start": "2024-01-16T09:00:00Z",
                    "attendees": ["alice@company.com", "bob@company.com"],
                }),
                json!({
                    "event_id": "evt_002",
                    "title": "Budget Planning Session",
                    "start": "2024-01-17T14:00:00Z",
                    "attendees": ["manager@company.com"],
                }),
            ],
        }
    }
}

#[async_trait]
impl InlineBackend for CalendarDemo {
    fn instructions(&self) -> String {
        "Calendar service for viewing and scheduling events. Read /today or \
         /week for event listings and /event/{id} for one event; use the \
         create_event action on /events."
            .to_string()
    }

    fn resources(&self) -> Vec<String> {
        let mut resources = vec!["/today".to_string(), "/week".to_string()];
        resources.extend(
            self.events
                .iter()
                .filter_map(|e| e["event_id"].as_str())
                .map(|id| format!("/event/{id}")),
        );
        resources
    }

    async fn read(&self, path: &str, _ctx: &GatewayContext) -> Result<Value> {
        match path {
            "/today" | "/week" => Ok(json!({"events": self.events})),
            _ => {
                if let Some(id) = path.strip_prefix("/event/") {
                    return self
                        .events
                        .iter()
                        .find(|e| e["event_id"].as_str() == Some(id))
                        .cloned()
                        .ok_or_else(|| GatewayError::Protocol {
                            service: "calendar".to_string(),
                            details: format!("event '{id}' not found"),
                        });
                }
                Err(GatewayError::Protocol {
                    service: "calendar".to_string(),
                    details: format!("no resource at {path}"),
                })
            }
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let needle = query.to_lowercase();
        Ok(self
            .events
            .iter()
            .filter(|e| {
                e["title"]
                    .as_str()
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains(&needle)
            })
            .filter_map(|e| e["event_id"].as_str())
            .map(|id| format!("/event/{id}"))
            .collect())
    }

    async fn invoke(&self, action: &str, path: &str, ctx: &GatewayContext) -> Result<Value> {
        match action {
            "create_event" => {
                let outcome = ctx
                    .prompt(PromptRequest {
                        message: "Create new calendar event".to_string(),
                        schema: json!({
                            "type": "object",
                            "properties": {
                                "title": {"type": "string"},
                                "start": {"type": "string", "description": "ISO-8601 start time"},
                                "attendees": {"type": "string", "description": "Attendees (comma-separated)"}
                            },
                            "required": ["title", "start"]
                        }),
                    })
                    .await?;
                match outcome.action {
                    PromptAction::Accept => Ok(json!({
                        "status": "created",
                        "event": outcome.content,
                    })),
                    _ => Ok(json!({"status": "cancelled"})),
                }
            }
            other => Err(GatewayError::Protocol {
                service: "calendar".to_string(),
                details: format!("unknown action '{other}' on {path}"),
            }),
        }
    }
}
