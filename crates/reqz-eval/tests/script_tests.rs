use anyhow::Result;
use reqz_eval::{
    DefinitionShape, DirectiveArgs, DirectiveDefinition, Environment, ErrorKind, EvalError, Extension,
    ExtensionRegistry, HttpRequest, HttpResponse, Prompt, Prompter, RequestLogger, RequestModule, Services,
    Transport, TransportError, Value, Vars,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use tempfile::TempDir;

type Responder = Rc<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError>>;

#[derive(Clone)]
struct MockTransport {
    sent: Rc<RefCell<Vec<HttpRequest>>>,
    responder: Responder,
}

impl MockTransport {
    fn ok() -> Self {
        Self::with(|req| Ok(json_response(200, &format!(r#"{{"url":"{}"}}"#, req.url))))
    }

    fn with(responder: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + 'static) -> Self {
        Self { sent: Rc::new(RefCell::new(Vec::new())), responder: Rc::new(responder) }
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.sent.borrow().clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent.borrow_mut().push(request.clone());
        (self.responder)(request)
    }
}

fn json_response(status: u16, text: &str) -> HttpResponse {
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    HttpResponse::new(status, headers, text)
}

#[derive(Clone, Default)]
struct RecordingLogger {
    events: Rc<RefCell<Vec<String>>>,
}

impl RecordingLogger {
    fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    fn push(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl RequestLogger for RecordingLogger {
    fn echo(&self, message: &str) {
        self.push(format!("echo {message}"));
    }
    fn inspect(&self, value: &Value) {
        self.push(format!("inspect {}", value.to_json_string()));
    }
    fn log_request(&self, request: &HttpRequest) {
        self.push(format!("request {} {}", request.method, request.url));
    }
    fn log_child_request(&self, request: &HttpRequest) {
        self.push(format!("child request {} {}", request.method, request.url));
    }
    fn log_response(&self, response: &HttpResponse) {
        self.push(format!("response {}", response.status));
    }
    fn log_child_response(&self, response: &HttpResponse) {
        self.push(format!("child response {}", response.status));
    }
    fn log_response_error(&self, _request: &HttpRequest, error: &TransportError) {
        self.push(format!("error {}", error.message));
    }
}

struct ScriptedPrompter {
    answers: BTreeMap<String, String>,
    asked: Rc<RefCell<Vec<Prompt>>>,
}

impl Prompter for ScriptedPrompter {
    fn ask(&self, prompts: &[Prompt]) -> Result<BTreeMap<String, String>> {
        self.asked.borrow_mut().extend(prompts.iter().cloned());
        Ok(prompts
            .iter()
            .filter_map(|p| self.answers.get(&p.name).map(|a| (p.name.clone(), a.clone())))
            .collect())
    }
}

struct Harness {
    transport: MockTransport,
    logger: RecordingLogger,
    services: Services,
}

impl Harness {
    fn new() -> Self {
        Self::with_transport(MockTransport::ok())
    }

    fn with_transport(transport: MockTransport) -> Self {
        let logger = RecordingLogger::default();
        let services = Services::new(transport.clone()).with_logger(logger.clone());
        Self { transport, logger, services }
    }

    fn module(&self) -> RequestModule {
        RequestModule::new(self.services.clone())
    }

    fn load(&self, script: &str) -> Result<RequestModule> {
        self.module().load_content(script)
    }
}

fn vars(pairs: &[(&str, Value)]) -> Vars {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn write(dir: &Path, name: &str, content: &str) -> Result<()> {
    std::fs::write(dir.join(name), content)?;
    Ok(())
}

#[test]
fn test_lone_get_sends_one_request() -> Result<()> {
    let h = Harness::new();
    let module = h.load("GET https://api.test/ping")?;
    let response = module.exec(Vars::default())?.expect("a response");

    let sent = h.transport.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, "GET");
    assert_eq!(sent[0].url, "https://api.test/ping");
    assert_eq!(sent[0].body, None);
    assert_eq!(response, json_response(200, r#"{"url":"https://api.test/ping"}"#));
    assert_eq!(h.logger.events(), ["request GET https://api.test/ping", "response 200"]);
    Ok(())
}

#[test]
fn test_script_without_request_returns_none() -> Result<()> {
    let h = Harness::new();
    let module = h.load("@set a = 1")?;
    assert!(module.exec(Vars::default())?.is_none());
    assert!(h.transport.requests().is_empty());
    Ok(())
}

#[test]
fn test_missing_variable_fails_before_network() -> Result<()> {
    let h = Harness::new();
    let module = h.load("@var id\nGET https://api.test/users/{{id}}")?;
    let err = module.exec(Vars::default()).unwrap_err();
    assert_eq!(err.to_string(), "variable not found: id");
    assert_eq!(EvalError::kind_of(&err), Some(ErrorKind::VariableNotFound));
    assert!(h.transport.requests().is_empty());
    Ok(())
}

#[test]
fn test_headers_query_and_json_body() -> Result<()> {
    let h = Harness::new();
    let script = r#"
@var key
@headers
  X-Api-Key: {{key}}
  Accept: application/json
@query {
  ids: [1, 2],
  skip: null
}
POST https://api.test/items
X-Trace: t-1

{
  name: {{key}},
  count: 2
}
"#;
    let module = h.load(script)?;
    module.exec(vars(&[("key", Value::from("k-9"))]))?;

    let sent = h.transport.requests();
    assert_eq!(sent.len(), 1);
    let req = &sent[0];
    assert_eq!(req.url, "https://api.test/items?ids=1%2C2");
    assert_eq!(req.headers.get("X-Api-Key").map(String::as_str), Some("k-9"));
    assert_eq!(req.headers.get("Accept").map(String::as_str), Some("application/json"));
    assert_eq!(req.headers.get("X-Trace").map(String::as_str), Some("t-1"));
    assert_eq!(req.headers.get("Content-Type").map(String::as_str), Some("application/json"));
    let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap_or(""))?;
    assert_eq!(body, serde_json::json!({"name": "k-9", "count": 2}));
    Ok(())
}

#[test]
fn test_text_body_keeps_content_type() -> Result<()> {
    let h = Harness::new();
    let module = h.load("POST https://api.test/echo\nContent-Type: text/plain\n\nhello {{who}}\nsecond line\n")?;
    module.exec(vars(&[("who", Value::from("ada"))]))?;

    let req = &h.transport.requests()[0];
    assert_eq!(req.body.as_deref(), Some("hello ada\nsecond line"));
    assert_eq!(req.headers.len(), 1);
    Ok(())
}

#[test]
fn test_reexecution_does_not_leak_state() -> Result<()> {
    let h = Harness::new();
    let module = h.load("@var id\n@set path ?= /users/{{id}}\nGET https://api.test{{path}}")?;
    module.exec(vars(&[("id", Value::from(1.0))]))?;
    module.exec(vars(&[("id", Value::from(2.0))]))?;

    let urls: Vec<String> = h.transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, ["https://api.test/users/1", "https://api.test/users/2"]);
    Ok(())
}

#[test]
fn test_method_without_url() -> Result<()> {
    let h = Harness::new();
    let module = h.load("GET")?;
    let err = module.exec(Vars::default()).unwrap_err();
    assert_eq!(err.to_string(), "missing request URL");
    assert_eq!(EvalError::kind_of(&err), Some(ErrorKind::MissingRequest));
    Ok(())
}

#[test]
fn test_error_response_is_returned() -> Result<()> {
    let transport = MockTransport::with(|_| {
        Err(TransportError::with_response("404 Not Found", json_response(404, r#"{"error":"nope"}"#)))
    });
    let h = Harness::with_transport(transport);
    let response = h.load("GET https://api.test/missing")?.exec(Vars::default())?.expect("a response");

    assert_eq!(response.status, 404);
    assert_eq!(h.logger.events(), ["request GET https://api.test/missing", "error 404 Not Found"]);
    Ok(())
}

#[test]
fn test_connection_error_propagates() -> Result<()> {
    let h = Harness::with_transport(MockTransport::with(|_| Err(TransportError::new("connection refused"))));
    let err = h.load("GET https://api.test/x")?.exec(Vars::default()).unwrap_err();
    assert_eq!(err.to_string(), "connection refused");
    assert!(err.downcast_ref::<TransportError>().is_some());
    Ok(())
}

#[test]
fn test_echo_and_inspect() -> Result<()> {
    let h = Harness::new();
    let module = h.load("@set tpl = `{{name}}!`\n@echo hello {{tpl}}\n@inspect user.id")?;
    let mut user = reqz_eval::Object::new();
    user.insert("id".into(), Value::from(7.0));
    module.exec(vars(&[("name", Value::from("ada")), ("user", Value::Object(user))]))?;

    assert_eq!(h.logger.events(), ["echo hello ada!", "inspect 7"]);
    Ok(())
}

#[test]
fn test_object_string_escapes() -> Result<()> {
    let h = Harness::new();
    let module = h.load("@set x = { a: \"\\u0041\", b: 'tab\\there' }\n@echo {{x.a}} {{x.b}}")?;
    module.exec(Vars::default())?;

    assert_eq!(h.logger.events(), ["echo A tab\there"]);
    Ok(())
}

#[test]
fn test_include_shares_environment() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "common.req", "@var host\n@set token = secret-{{host}}\n@header X-Token: {{token}}")?;
    write(dir.path(), "main.req", "@include common.req\nGET https://{{host}}/me")?;

    let h = Harness::new();
    let module = h.module().load_file(dir.path().join("main.req"))?;
    module.exec(vars(&[("host", Value::from("api.test"))]))?;

    let req = &h.transport.requests()[0];
    assert_eq!(req.url, "https://api.test/me");
    assert_eq!(req.headers.get("X-Token").map(String::as_str), Some("secret-api.test"));
    Ok(())
}

#[test]
fn test_included_declarations_stable_across_runs() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "setup.req", "@var token?")?;
    write(dir.path(), "main.req", "@include setup.req\nGET https://api.test/me")?;

    let h = Harness::new();
    let module = h.module().load_file(dir.path().join("main.req"))?;
    let mut counts = Vec::new();
    for _ in 0..3 {
        module.exec(Vars::default())?;
        counts.push(module.declared_vars().len());
    }

    assert_eq!(counts, vec![1, 1, 1]);
    assert!(!module.declared_vars()[0].required);
    assert_eq!(h.transport.requests().len(), 3);
    Ok(())
}

#[test]
fn test_run_isolates_environment() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "login.req", "@set leaked = yes\nPOST https://api.test/login\n\n{ user: user }")?;
    write(
        dir.path(),
        "main.req",
        "@run login.req using {\n  user: 'ada'\n}\n@set status = {{$response.status}}\nGET https://api.test/me",
    )?;

    let h = Harness::new();
    let module = h.module().load_file(dir.path().join("main.req"))?;
    let mut env = Environment::new();
    env.set("user", Value::from("outer"));
    module.exec_with_env(&mut env)?;

    assert!(!env.contains("leaked"));
    assert_eq!(env.get("status"), Some(Value::Number(200.0)));
    assert_eq!(env.get("$response").and_then(|r| r.get("ok").cloned()), Some(Value::Bool(true)));

    let sent = h.transport.requests();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].body.as_deref(), Some(r#"{"user":"ada"}"#));
    assert_eq!(sent[1].url, "https://api.test/me");

    let events = h.logger.events();
    assert_eq!(events[0], "child request POST https://api.test/login");
    assert_eq!(events[2], "request GET https://api.test/me");
    Ok(())
}

#[test]
fn test_run_without_using_inherits_vars() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "child.req", "GET https://api.test/{{id}}")?;
    write(dir.path(), "main.req", "@run child.req")?;

    let h = Harness::new();
    let module = h.module().load_file(dir.path().join("main.req"))?;
    assert!(module.exec(vars(&[("id", Value::from(5.0))]))?.is_none());
    assert_eq!(h.transport.requests()[0].url, "https://api.test/5");
    Ok(())
}

#[test]
fn test_body_from_file() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "payload.json", r#"{"raw": "{{not interpolated}}"}"#)?;
    write(dir.path(), "main.req", "PUT https://api.test/doc\n\n@file payload.json")?;

    let h = Harness::new();
    h.module().load_file(dir.path().join("main.req"))?.exec(Vars::default())?;
    let req = &h.transport.requests()[0];
    assert_eq!(req.body.as_deref(), Some(r#"{"raw": "{{not interpolated}}"}"#));
    Ok(())
}

#[test]
fn test_safe_read_file_stays_inside_module() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::create_dir(dir.path().join("api"))?;
    write(dir.path(), "secret.txt", "s")?;
    write(&dir.path().join("api"), "data.txt", "d")?;
    write(&dir.path().join("api"), "main.req", "@set a = 1")?;

    let h = Harness::new();
    let module = h.module().load_file(dir.path().join("api").join("main.req"))?;
    assert_eq!(module.safe_read_file("data.txt")?, "d");
    let err = module.safe_read_file("../secret.txt").unwrap_err();
    assert!(err.to_string().contains("outside the module directory"));
    Ok(())
}

#[test]
fn test_parse_error_names_file_and_line() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "bad.req", "@var a\n\nnonsense here")?;
    let h = Harness::new();
    let err = h.module().load_file(dir.path().join("bad.req")).unwrap_err();
    let parse_error = err.downcast_ref::<reqz_syntax::ParseError>().expect("a parse error");
    assert_eq!(parse_error.line(), Some(3));
    assert!(parse_error.file().is_some_and(|f| f.ends_with("bad.req")));
    Ok(())
}

#[test]
fn test_prompt_asks_for_unbound_vars() -> Result<()> {
    let asked = Rc::new(RefCell::new(Vec::new()));
    let mut answers = BTreeMap::new();
    answers.insert("password".to_string(), "hunter2".to_string());
    answers.insert("remember".to_string(), "true".to_string());
    let prompter = ScriptedPrompter { answers, asked: asked.clone() };

    let h = Harness::new();
    let services = h.services.clone().with_prompter(prompter);
    let script = r#"
@var user, password
@prompt {
  user: "User",
  password: { message: "Password", type: "password" },
  remember: { message: "Remember?", type: "confirm" }
}
GET https://api.test/login?u={{user}}&p={{password}}
"#;
    let module = RequestModule::new(services).load_content(script)?;
    module.exec(vars(&[("user", Value::from("ada"))]))?;

    let asked: Vec<String> = asked.borrow().iter().map(|p| p.name.clone()).collect();
    assert_eq!(asked, ["password", "remember"]);
    assert_eq!(h.transport.requests()[0].url, "https://api.test/login?u=ada&p=hunter2");
    Ok(())
}

#[test]
fn test_prompt_without_prompter_fails() -> Result<()> {
    let h = Harness::new();
    let err = h.load("@prompt { name: 'Name' }")?.exec(Vars::default()).unwrap_err();
    assert_eq!(EvalError::kind_of(&err), Some(ErrorKind::Prompt));
    Ok(())
}

#[test]
fn test_http_extension() -> Result<()> {
    let h = Harness::new();
    let script = r#"
@import "reqz:http"
@auth basic {{user}}:pass
@accept json
@type form
GET https://api.test/search?q={{term | urlencode}}
"#;
    h.load(script)?.exec(vars(&[("user", Value::from("user")), ("term", Value::from("a b&c"))]))?;

    let req = &h.transport.requests()[0];
    assert_eq!(req.url, "https://api.test/search?q=a%20b%26c");
    assert_eq!(req.headers.get("Authorization").map(String::as_str), Some("Basic dXNlcjpwYXNz"));
    assert_eq!(req.headers.get("Accept").map(String::as_str), Some("application/json"));
    assert_eq!(req.headers.get("Content-Type").map(String::as_str), Some("application/x-www-form-urlencoded"));
    Ok(())
}

#[test]
fn test_extension_directive_unknown_before_import() -> Result<()> {
    let h = Harness::new();
    let err = h.load("@auth bearer x\n@import \"reqz:http\"").unwrap_err();
    assert!(err.to_string().starts_with("unexpected line: @auth bearer x"));
    Ok(())
}

#[test]
fn test_custom_extension() -> Result<()> {
    let tenant = Extension::new("acme")
        .with_value("region", Value::from("eu"))
        .with_filter("shout", |v| Ok(Value::from(format!("{}!", v.display().to_uppercase()))))
        .with_function("stamp", |_, env| {
            env.headers.insert("X-Stamp".into(), "1".into());
            Ok(())
        })
        .with_directive(
            DirectiveDefinition::named("tenant").with_args(DirectiveArgs::Object).required(),
            |_, env, value| {
                let id = value.get("id").map(Value::display).unwrap_or_default();
                env.headers.insert("X-Tenant".into(), id);
                Ok(())
            },
        )
        .with_directive(
            DirectiveDefinition::named("@tags")
                .with_args(DirectiveArgs::Custom(Arc::new(|arg: &str, lines: Option<&[String]>| -> Result<Value> {
                    let mut tags = vec![Value::from(arg)];
                    tags.extend(lines.unwrap_or_default().iter().map(|l| Value::from(l.as_str())));
                    Ok(Value::Array(tags))
                })))
                .with_shape(DefinitionShape::Block),
            |_, env, value| {
                env.set("tags", value);
                Ok(())
            },
        );

    let mut registry = ExtensionRegistry::with_stdlib();
    registry.register(tenant);
    let h = Harness::new();
    let services = h.services.clone().with_extensions(registry);

    let script = r#"
@lib acme
@tenant {
  id: {{org}}
}
@tags first
  second
@call stamp
@set loud = {{region | shout}}
GET https://{{region}}.api.test/{{loud}}
"#;
    let module = RequestModule::new(services).load_content(script)?;
    let mut env = Environment::with_vars(vars(&[("org", Value::from(42.0))]));
    module.exec_with_env(&mut env)?;

    assert_eq!(env.get("tags"), Some(Value::Array(vec![Value::from("first"), Value::from("second")])));
    let req = &h.transport.requests()[0];
    assert_eq!(req.url, "https://eu.api.test/EU!");
    assert_eq!(req.headers.get("X-Tenant").map(String::as_str), Some("42"));
    assert_eq!(req.headers.get("X-Stamp").map(String::as_str), Some("1"));
    Ok(())
}

#[test]
fn test_call_unknown_function() -> Result<()> {
    let h = Harness::new();
    let err = h.load("@call nope")?.exec(Vars::default()).unwrap_err();
    assert_eq!(err.to_string(), "unknown function: nope");
    Ok(())
}

#[test]
fn test_import_unknown_extension() {
    let h = Harness::new();
    let err = h.load("@import \"nowhere\"").unwrap_err();
    assert!(err.to_string().starts_with("extension not found: nowhere"));
}

#[test]
fn test_included_directives_reach_includer() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "setup.req", "@import \"reqz:http\"\n@var token?")?;
    write(dir.path(), "main.req", "@include setup.req\nGET https://api.test/x")?;

    let h = Harness::new();
    let module = h.module().load_file(dir.path().join("main.req"))?;
    module.exec(Vars::default())?;
    assert!(module.has_directive("@auth"));
    assert!(module.declared_vars().iter().any(|v| v.name == "token" && !v.required));
    Ok(())
}

#[test]
fn test_play_runs_once_per_row() -> Result<()> {
    let h = Harness::new();
    let module = h.load("@var id, active\nGET https://api.test/users/{{id}}?active={{active}}&row={{$play.id}}")?;
    let csv = "# users to check\nid, active\n1, true\n2, false\n3, true\n";
    let base = vars(&[("unused", Value::from("x"))]);
    let responses = reqz_eval::play(&module, csv.as_bytes(), &base, b',')?;

    assert_eq!(responses.len(), 3);
    let urls: Vec<String> = h.transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        [
            "https://api.test/users/1?active=true&row=1",
            "https://api.test/users/2?active=false&row=2",
            "https://api.test/users/3?active=true&row=3",
        ]
    );
    Ok(())
}

#[test]
fn test_play_reports_failing_row() -> Result<()> {
    let h = Harness::new();
    let module = h.load("@required token\nGET https://api.test/{{id}}")?;
    let csv = "id\ttoken\n1\tt\n2\t\n";
    let mut base = Vars::default();
    base.insert("other".into(), Value::Null);

    let responses = reqz_eval::play(&module, "id\n1\n".as_bytes(), &base, b',');
    assert!(format!("{:#}", responses.unwrap_err()).contains("Row 1 failed"));

    let responses = reqz_eval::play(&module, csv.as_bytes(), &base, b'\t')?;
    assert_eq!(responses.len(), 2);
    assert_eq!(h.transport.requests().len(), 2);
    Ok(())
}
