//! In-memory GitLab used by the integration tests
//!
//! Implements just enough of the REST and GraphQL APIs for the handlers:
//! objects live in a map keyed by their API path, and faults can be queued
//! to answer the next matching request instead.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tanuki_core::retry::RetryConfig;
use tanuki_provider_gitlab::http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use tanuki_provider_gitlab::{GitLabClient, GitLabProvider};

pub const API: &str = "https://gitlab.example.com/api/v4";
pub const GRAPHQL: &str = "https://gitlab.example.com/api/graphql";

const TIMESTAMP: &str = "2024-01-01T00:00:00Z";

struct Fault {
    method: HttpMethod,
    url_contains: String,
    status: u16,
    body: String,
}

/// One request as the fake received it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: HttpMethod,
    pub url: String,
    /// Decoded JSON body, `Null` when there was none
    pub body: Value,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, Value>,
    faults: Vec<Fault>,
    requests: Vec<Recorded>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone, Default)]
pub struct FakeGitLab {
    inner: Arc<Mutex<Inner>>,
}

fn respond(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: serde_json::to_vec(&body).unwrap(),
    }
}

fn no_content() -> HttpResponse {
    HttpResponse {
        status: 204,
        headers: Vec::new(),
        body: Vec::new(),
    }
}

fn not_found(what: &str) -> HttpResponse {
    respond(404, json!({ "message": format!("404 {} Not Found", what) }))
}

fn decode(s: &str) -> String {
    urlencoding::decode(s).map(|c| c.into_owned()).unwrap_or_else(|_| s.to_string())
}

fn split_url(url: &str) -> (Vec<String>, HashMap<String, String>) {
    let rest = url.strip_prefix(API).unwrap_or(url);
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    let segments = path
        .trim_start_matches('/')
        .split('/')
        .map(decode)
        .collect();
    let query = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (decode(k), decode(v)))
        .collect();
    (segments, query)
}

/// Copy the listed fields of `from` onto `to` when present
fn merge(to: &mut Value, from: &Value, fields: &[&str]) {
    for field in fields {
        if let Some(v) = from.get(*field) {
            to[*field] = v.clone();
        }
    }
}

impl FakeGitLab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client over this fake, with a fast file retry
    pub fn client(&self) -> GitLabClient {
        GitLabClient::new(API, "glpat-test", Arc::new(self.clone())).with_file_retry(
            RetryConfig::new(Duration::from_millis(1), Duration::from_millis(5)).with_jitter(false),
        )
    }

    pub fn provider(&self) -> GitLabProvider {
        GitLabProvider::new(self.client(), &tanuki_provider_gitlab::registry())
    }

    /// Answer the next request with `method` whose URL contains `url_contains`
    pub fn fail_next(&self, method: HttpMethod, url_contains: &str, status: u16, body: Value) {
        self.inner.lock().unwrap().faults.push(Fault {
            method,
            url_contains: url_contains.to_string(),
            status,
            body: body.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Bodies of the requests with `method` whose URL contains `url_contains`
    pub fn bodies(&self, method: HttpMethod, url_contains: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url.contains(url_contains))
            .map(|r| r.body)
            .collect()
    }

    /// Number of requests with `method` whose URL contains `url_contains`
    pub fn count(&self, method: HttpMethod, url_contains: &str) -> usize {
        self.bodies(method, url_contains).len()
    }

    pub fn object(&self, key: &str) -> Option<Value> {
        self.inner.lock().unwrap().objects.get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.lock().unwrap().objects.remove(key)
    }

    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(Recorded {
            method: request.method,
            url: request.url.clone(),
            body: body.clone(),
        });

        if let Some(pos) = inner
            .faults
            .iter()
            .position(|f| f.method == request.method && request.url.contains(&f.url_contains))
        {
            let fault = inner.faults.remove(pos);
            return HttpResponse {
                status: fault.status,
                headers: Vec::new(),
                body: fault.body.into_bytes(),
            };
        }

        if request.url == GRAPHQL {
            return respond(
                200,
                json!({
                    "data": {
                        "currentUser": {
                            "id": "gid://gitlab/User/1",
                            "username": "root",
                            "name": "Administrator",
                            "bot": false,
                            "groupCount": 2,
                            "namespace": {"id": "gid://gitlab/Namespaces::UserNamespace/5"},
                            "publicEmail": "admin@example.com"
                        }
                    }
                }),
            );
        }

        let (segments, query) = split_url(&request.url);
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let method = request.method;

        match segments.as_slice() {
            ["user"] => respond(200, json!({"id": 1, "username": "root"})),
            ["projects", p, "variables"] => {
                variables(&mut inner, method, &Owner::project(p), &query, &body)
            }
            ["projects", p, "variables", key] => {
                variable(&mut inner, method, &Owner::project(p), key, &query, &body)
            }
            ["groups", g, "variables"] => {
                variables(&mut inner, method, &Owner::group(g), &query, &body)
            }
            ["groups", g, "variables", key] => {
                variable(&mut inner, method, &Owner::group(g), key, &query, &body)
            }
            ["admin", "ci", "variables"] => {
                variables(&mut inner, method, &Owner::instance(), &query, &body)
            }
            ["admin", "ci", "variables", key] => {
                variable(&mut inner, method, &Owner::instance(), key, &query, &body)
            }
            ["projects", p, "milestones"] => milestones(&mut inner, method, p, &query, &body),
            ["projects", p, "milestones", id] => milestone(&mut inner, method, p, id, &body),
            ["projects", p, "issues"] => issues(&mut inner, method, p, &body),
            ["projects", p, "issues", iid] => issue(&mut inner, method, p, iid, &body),
            ["projects", p, "cluster_agents", agent, "tokens"] => {
                agent_tokens(&mut inner, method, p, agent, &body)
            }
            ["projects", p, "cluster_agents", agent, "tokens", id] => {
                agent_token(&mut inner, method, p, agent, id)
            }
            ["projects", p, "repository", "files", path] => {
                file(&mut inner, method, p, path, &query, &body)
            }
            ["projects", p, "repository", "branches"] => branches(&mut inner, method, p, &body),
            ["projects", p, "repository", "branches", name] => branch(&mut inner, method, p, name),
            ["projects", p, "share"] => share(&mut inner, method, p, &body),
            ["projects", p, "share", group] => unshare(&mut inner, method, p, group),
            ["projects", p] if method == HttpMethod::Get => project(&inner, p),
            _ => not_found(""),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeGitLab {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        Ok(self.handle(&request))
    }
}

fn scope_of(query: &HashMap<String, String>) -> String {
    query
        .get("filter[environment_scope]")
        .cloned()
        .unwrap_or_else(|| "*".to_string())
}

/// Where a variable lives. Instance variables carry no environment scope.
struct Owner {
    prefix: String,
    scoped: bool,
}

impl Owner {
    fn project(project: &str) -> Self {
        Self {
            prefix: format!("variable/{}/", project),
            scoped: true,
        }
    }

    fn group(group: &str) -> Self {
        Self {
            prefix: format!("variable/group:{}/", group),
            scoped: true,
        }
    }

    fn instance() -> Self {
        Self {
            prefix: "variable/instance/".to_string(),
            scoped: false,
        }
    }

    fn key(&self, key: &str, scope: &str) -> String {
        if self.scoped {
            format!("{}{}/{}", self.prefix, key, scope)
        } else {
            format!("{}{}", self.prefix, key)
        }
    }
}

fn variables(
    inner: &mut Inner,
    method: HttpMethod,
    owner: &Owner,
    query: &HashMap<String, String>,
    body: &Value,
) -> HttpResponse {
    match method {
        HttpMethod::Post => {
            let key = body["key"].as_str().unwrap_or_default();
            let scope = body["environment_scope"].as_str().unwrap_or("*");
            let object_key = owner.key(key, scope);
            if inner.objects.contains_key(&object_key) {
                return respond(
                    400,
                    json!({"message": {"key": [format!("({}) has already been taken", key)]}}),
                );
            }
            let value = body["value"].as_str().unwrap_or_default();
            if body["masked"].as_bool() == Some(true) && value.len() < 8 {
                return respond(400, json!({"message": {"value": ["is invalid"]}}));
            }
            let mut variable = json!({
                "key": key,
                "value": value,
                "variable_type": "env_var",
                "protected": false,
                "masked": false,
            });
            if owner.scoped {
                variable["environment_scope"] = json!(scope);
            }
            merge(&mut variable, body, &["variable_type", "protected", "masked"]);
            inner.objects.insert(object_key, variable.clone());
            respond(201, variable)
        }
        HttpMethod::Get => {
            let scope = query.get("filter[environment_scope]");
            let items: Vec<Value> = inner
                .objects
                .iter()
                .filter(|(k, v)| {
                    k.starts_with(&owner.prefix)
                        && scope.is_none_or(|s| v["environment_scope"].as_str() == Some(s.as_str()))
                })
                .map(|(_, v)| v.clone())
                .collect();
            respond(200, Value::Array(items))
        }
        _ => not_found(""),
    }
}

fn variable(
    inner: &mut Inner,
    method: HttpMethod,
    owner: &Owner,
    key: &str,
    query: &HashMap<String, String>,
    body: &Value,
) -> HttpResponse {
    let object_key = owner.key(key, &scope_of(query));
    match method {
        HttpMethod::Get => match inner.objects.get(&object_key) {
            Some(v) => respond(200, v.clone()),
            None => not_found("Variable"),
        },
        HttpMethod::Put => match inner.objects.get_mut(&object_key) {
            Some(v) => {
                let value = body["value"].as_str().or(v["value"].as_str()).unwrap_or_default();
                let masked = body["masked"].as_bool().or(v["masked"].as_bool()) == Some(true);
                if masked && value.len() < 8 {
                    return respond(400, json!({"message": {"value": ["is invalid"]}}));
                }
                merge(v, body, &["value", "variable_type", "protected", "masked"]);
                respond(200, v.clone())
            }
            None => not_found("Variable"),
        },
        HttpMethod::Delete => match inner.objects.remove(&object_key) {
            Some(_) => no_content(),
            None => not_found("Variable"),
        },
        HttpMethod::Post => not_found(""),
    }
}

fn milestones(
    inner: &mut Inner,
    method: HttpMethod,
    project: &str,
    query: &HashMap<String, String>,
    body: &Value,
) -> HttpResponse {
    let prefix = format!("milestone/{}/", project);
    match method {
        HttpMethod::Post => {
            let id = inner.next_id();
            let iid = inner.objects.keys().filter(|k| k.starts_with(&prefix)).count() + 1;
            let mut milestone = json!({
                "id": id,
                "iid": iid,
                "project_id": project.parse::<i64>().ok(),
                "title": body["title"],
                "description": null,
                "due_date": null,
                "start_date": null,
                "state": "active",
                "created_at": TIMESTAMP,
                "updated_at": TIMESTAMP,
                "web_url": format!("https://gitlab.example.com/{}/-/milestones/{}", project, iid),
                "expired": false,
            });
            merge(&mut milestone, body, &["description", "due_date", "start_date"]);
            inner.objects.insert(format!("{}{}", prefix, id), milestone.clone());
            respond(201, milestone)
        }
        HttpMethod::Get => {
            let items: Vec<Value> = inner
                .objects
                .iter()
                .filter(|(k, v)| {
                    k.starts_with(&prefix)
                        && query
                            .get("state")
                            .is_none_or(|s| v["state"].as_str() == Some(s.as_str()))
                })
                .map(|(_, v)| v.clone())
                .collect();
            respond(200, Value::Array(items))
        }
        _ => not_found(""),
    }
}

fn milestone(
    inner: &mut Inner,
    method: HttpMethod,
    project: &str,
    id: &str,
    body: &Value,
) -> HttpResponse {
    let key = format!("milestone/{}/{}", project, id);
    match method {
        HttpMethod::Get => match inner.objects.get(&key) {
            Some(m) => respond(200, m.clone()),
            None => not_found("Milestone"),
        },
        HttpMethod::Put => match inner.objects.get_mut(&key) {
            Some(m) => {
                merge(m, body, &["title", "description", "due_date", "start_date"]);
                match body["state_event"].as_str() {
                    Some("close") => m["state"] = json!("closed"),
                    Some("activate") => m["state"] = json!("active"),
                    _ => {}
                }
                respond(200, m.clone())
            }
            None => not_found("Milestone"),
        },
        HttpMethod::Delete => match inner.objects.remove(&key) {
            Some(_) => no_content(),
            None => not_found("Milestone"),
        },
        HttpMethod::Post => not_found(""),
    }
}

fn issues(inner: &mut Inner, method: HttpMethod, project: &str, body: &Value) -> HttpResponse {
    if method != HttpMethod::Post {
        return not_found("");
    }
    let prefix = format!("issue/{}/", project);
    let id = inner.next_id();
    let iid = body["iid"]
        .as_i64()
        .unwrap_or_else(|| inner.objects.keys().filter(|k| k.starts_with(&prefix)).count() as i64 + 1);
    let labels: Vec<&str> = body["labels"]
        .as_str()
        .map(|l| l.split(',').filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let mut issue = json!({
        "id": id,
        "iid": iid,
        "title": body["title"],
        "description": null,
        "state": "opened",
        "confidential": false,
        "created_at": TIMESTAMP,
        "updated_at": TIMESTAMP,
        "issue_type": "issue",
        "labels": labels,
        "assignees": [],
        "discussion_locked": null,
        "web_url": format!("https://gitlab.example.com/{}/-/issues/{}", project, iid),
    });
    merge(&mut issue, body, &["description", "confidential", "issue_type", "due_date", "weight"]);
    inner.objects.insert(format!("{}{}", prefix, iid), issue.clone());
    respond(201, issue)
}

fn issue(inner: &mut Inner, method: HttpMethod, project: &str, iid: &str, body: &Value) -> HttpResponse {
    let key = format!("issue/{}/{}", project, iid);
    match method {
        HttpMethod::Get => match inner.objects.get(&key) {
            Some(i) => respond(200, i.clone()),
            None => not_found("Issue"),
        },
        HttpMethod::Put => match inner.objects.get_mut(&key) {
            Some(i) => {
                merge(i, body, &["title", "description", "confidential", "discussion_locked", "weight"]);
                if let Some(labels) = body["labels"].as_str() {
                    let labels: Vec<&str> = labels.split(',').filter(|s| !s.is_empty()).collect();
                    i["labels"] = json!(labels);
                }
                match body["state_event"].as_str() {
                    Some("close") => i["state"] = json!("closed"),
                    Some("reopen") => i["state"] = json!("opened"),
                    _ => {}
                }
                respond(200, i.clone())
            }
            None => not_found("Issue"),
        },
        HttpMethod::Delete => match inner.objects.remove(&key) {
            Some(_) => no_content(),
            None => not_found("Issue"),
        },
        HttpMethod::Post => not_found(""),
    }
}

fn agent_tokens(
    inner: &mut Inner,
    method: HttpMethod,
    project: &str,
    agent: &str,
    body: &Value,
) -> HttpResponse {
    if method != HttpMethod::Post {
        return not_found("");
    }
    let id = inner.next_id();
    let token = json!({
        "id": id,
        "name": body["name"],
        "description": body.get("description").cloned().unwrap_or(Value::Null),
        "agent_id": agent.parse::<i64>().unwrap_or_default(),
        "status": "active",
        "created_at": TIMESTAMP,
        "created_by_user_id": 1,
        "last_used_at": null,
    });
    inner
        .objects
        .insert(format!("agent_token/{}/{}/{}", project, agent, id), token.clone());

    let mut created = token;
    created["token"] = json!("glagent-secret-value");
    respond(201, created)
}

fn agent_token(inner: &mut Inner, method: HttpMethod, project: &str, agent: &str, id: &str) -> HttpResponse {
    let key = format!("agent_token/{}/{}/{}", project, agent, id);
    match method {
        HttpMethod::Get => match inner.objects.get(&key) {
            Some(t) => respond(200, t.clone()),
            None => not_found("Token"),
        },
        HttpMethod::Delete => match inner.objects.remove(&key) {
            Some(_) => no_content(),
            None => not_found("Token"),
        },
        _ => not_found(""),
    }
}

fn file(
    inner: &mut Inner,
    method: HttpMethod,
    project: &str,
    path: &str,
    query: &HashMap<String, String>,
    body: &Value,
) -> HttpResponse {
    let branch = match method {
        HttpMethod::Get => query.get("ref").cloned().unwrap_or_default(),
        _ => body["branch"].as_str().unwrap_or_default().to_string(),
    };
    let key = format!("file/{}/{}/{}", project, branch, path);
    let commit = format!("commit{}", inner.next_id());

    match method {
        HttpMethod::Get => match inner.objects.get(&key) {
            Some(f) => respond(200, f.clone()),
            None => not_found("File"),
        },
        HttpMethod::Post => {
            if inner.objects.contains_key(&key) {
                return respond(400, json!({"message": "A file with this name already exists"}));
            }
            let content = body["content"].as_str().unwrap_or_default();
            let file = json!({
                "file_name": path.rsplit('/').next().unwrap_or(path),
                "file_path": path,
                "size": content.len(),
                "encoding": "base64",
                "content": content,
                "content_sha256": "sha256",
                "ref": branch,
                "blob_id": "blob",
                "commit_id": commit,
                "last_commit_id": commit,
                "execute_filemode": body["execute_filemode"].as_bool().unwrap_or(false),
            });
            inner.objects.insert(key, file);
            respond(201, json!({"file_path": path, "branch": branch}))
        }
        HttpMethod::Put => match inner.objects.get_mut(&key) {
            Some(f) => {
                if body["last_commit_id"] != f["last_commit_id"] {
                    return respond(
                        400,
                        json!({"message": "You are attempting to update a file that has changed since you started editing it."}),
                    );
                }
                f["content"] = body["content"].clone();
                f["commit_id"] = json!(commit);
                f["last_commit_id"] = json!(commit);
                respond(200, json!({"file_path": path, "branch": branch}))
            }
            None => not_found("File"),
        },
        HttpMethod::Delete => match inner.objects.remove(&key) {
            Some(_) => no_content(),
            None => not_found("File"),
        },
    }
}

fn branches(inner: &mut Inner, method: HttpMethod, project: &str, body: &Value) -> HttpResponse {
    if method != HttpMethod::Post {
        return not_found("");
    }
    let name = body["branch"].as_str().unwrap_or_default();
    let branch = json!({
        "name": name,
        "web_url": format!("https://gitlab.example.com/{}/-/tree/{}", project, name),
        "default": false,
        "can_push": true,
        "commit": {
            "id": "0b4bc9a49b562e85de7cc9e834518ea6828729b9",
            "short_id": "0b4bc9a4",
            "title": "Initial commit",
            "author_name": "Administrator",
            "author_email": "admin@example.com",
            "committed_date": TIMESTAMP,
        }
    });
    inner
        .objects
        .insert(format!("branch/{}/{}", project, name), branch.clone());
    respond(201, branch)
}

fn branch(inner: &mut Inner, method: HttpMethod, project: &str, name: &str) -> HttpResponse {
    let key = format!("branch/{}/{}", project, name);
    match method {
        HttpMethod::Get => match inner.objects.get(&key) {
            Some(b) => respond(200, b.clone()),
            None => not_found("Branch"),
        },
        HttpMethod::Delete => match inner.objects.remove(&key) {
            Some(_) => no_content(),
            None => not_found("Branch"),
        },
        _ => not_found(""),
    }
}

fn project(inner: &Inner, project: &str) -> HttpResponse {
    let prefix = format!("share/{}/", project);
    let shared: Vec<Value> = inner
        .objects
        .iter()
        .filter(|(k, _)| k.starts_with(&prefix))
        .map(|(_, v)| v.clone())
        .collect();
    respond(
        200,
        json!({
            "id": project.parse::<i64>().unwrap_or(1),
            "shared_with_groups": shared,
        }),
    )
}

fn share(inner: &mut Inner, method: HttpMethod, project: &str, body: &Value) -> HttpResponse {
    if method != HttpMethod::Post {
        return not_found("");
    }
    let group_id = body["group_id"].as_i64().unwrap_or_default();
    inner.objects.insert(
        format!("share/{}/{}", project, group_id),
        json!({
            "group_id": group_id,
            "group_name": format!("group-{}", group_id),
            "group_access_level": body["group_access"],
        }),
    );
    respond(201, json!({"id": 1, "project_id": project, "group_id": group_id}))
}

fn unshare(inner: &mut Inner, method: HttpMethod, project: &str, group: &str) -> HttpResponse {
    if method != HttpMethod::Delete {
        return not_found("");
    }
    match inner.objects.remove(&format!("share/{}/{}", project, group)) {
        Some(_) => no_content(),
        None => not_found("Group Link"),
    }
}
