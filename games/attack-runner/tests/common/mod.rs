#![allow(dead_code)]

use async_trait::async_trait;
use attack_runner::{AttackRequest, CommandType, Coordinates, RunnerConfig, TroopMap};
use core_logic::{HttpBackend, HttpMethod, NetworkError, OutgoingRequest, RawResponse};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const ORIGIN: u64 = 101;

/// Unit placement screen: a token plus unit counts in all three layouts.
pub const PLACE_PAGE: &str = r##"<html><body>
<form id="command-data-form-units" action="/game.php?village=101&amp;screen=place&amp;try=confirm" method="post">
  <input type="hidden" name="h" value="a1b2c3d4e5">
  <input id="unit_input_axe" name="axe" type="number" data-all-count="100" value="">
  <input id="unit_input_spy" name="spy" type="number" value="">
  <a id="units_entry_all_spy" href="#">(5)</a>
  <input id="unit_input_light" name="light" type="number" value="">
  <a href="javascript:void(0)">(80)</a>
</form>
</body></html>"##;

pub const PLACE_PAGE_NO_TOKEN: &str = r#"<html><body>
  <input id="unit_input_light" name="light" type="number" data-all-count="80" value="">
</body></html>"#;

pub const OVERVIEW_PAGE: &str = r#"<html><body>
<a href="/game.php?village=101&amp;screen=overview&amp;h=0f0f0f0f0f">refresh</a>
</body></html>"#;

pub const MAIN_PAGE: &str = r#"<html><script>var game_data = {"village":{"id":101},"csrf":"abcdef012345"};</script></html>"#;

/// Prepare response with the confirmation form and the travel time.
pub const CONFIRM_PAGE: &str = r#"<html><body>
<h2>Confirm attack</h2>
<form id="command-data-form" action="/game.php?village=101&amp;screen=place&amp;action=command" method="post">
  <input type="hidden" name="ch" value="5f1c:9ab2">
  <input type="hidden" name="x" value="500">
  <input type="hidden" name="y" value="500">
  <input type="hidden" name="source_village" value="101">
  <input type="hidden" name="light" value="50">
  <input type="hidden" name="spy" value="1">
  <input type="hidden" name="attack" value="true">
  <input type="hidden" name="h" value="deadbeef00">
  <table>
    <tr><td>Duration:</td><td>4:42:51</td></tr>
  </table>
  <input type="submit" name="submit_confirm" value="Send attack">
</form>
</body></html>"#;

/// Confirmation form without any timing information.
pub const CONFIRM_PAGE_NO_DURATION: &str = r#"<form id="command-data-form" method="post">
  <input type="hidden" name="ch" value="77:aa">
  <input type="hidden" name="x" value="500">
  <input type="hidden" name="y" value="500">
</form>"#;

pub const SUCCESS_PAGE: &str = r#"<html><body><div class="info_box">Attack sent</div></body></html>"#;

pub const REJECTED_PAGE: &str = r#"<html><body>
<div class="error_box"><div class="content">Target village is under <b>beginner protection</b></div></div>
</body></html>"#;

pub const STALE_TOKEN_PAGE: &str = r#"<div class="error_box">Invalid token. Please reload the page.</div>"#;

pub const CHALLENGE_PAGE: &str = r#"<html><body><div id="bot_check">Please confirm you are human</div></body></html>"#;

pub const EMPTY_PAGE: &str = "<html><body>nothing here</body></html>";

pub type Reply = Result<RawResponse, NetworkError>;

pub fn ok(body: &str) -> Reply {
    Ok(RawResponse {
        status: 200,
        body: body.to_string(),
    })
}

pub fn status(code: u16) -> Reply {
    Ok(RawResponse {
        status: code,
        body: format!("<html>HTTP {}</html>", code),
    })
}

pub fn timeout() -> Reply {
    Err(NetworkError::Timeout {
        timeout_ms: 1000,
        endpoint: "scripted".to_string(),
    })
}

struct Route {
    method: HttpMethod,
    fragment: String,
    form_match: Option<(String, String)>,
    replies: VecDeque<Reply>,
}

impl Route {
    fn matches(&self, request: &OutgoingRequest) -> bool {
        self.method == request.method
            && request.url.contains(&self.fragment)
            && self
                .form_match
                .as_ref()
                .map_or(true, |(k, v)| request.form_value(k) == Some(v.as_str()))
    }
}

/// A backend that answers from scripted routes and records every request.
///
/// Routes are matched in registration order. Each route plays its replies
/// in order and then keeps repeating the last one. Unmatched requests get
/// a 404.
#[derive(Default)]
pub struct ScriptedBackend {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<OutgoingRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: HttpMethod, fragment: &str, replies: Vec<Reply>) {
        self.routes.lock().unwrap().push(Route {
            method,
            fragment: fragment.to_string(),
            form_match: None,
            replies: replies.into(),
        });
    }

    /// Like [`on`](Self::on), but only for bodies where `key == value`.
    pub fn on_form(&self, method: HttpMethod, fragment: &str, key: &str, value: &str, replies: Vec<Reply>) {
        self.routes.lock().unwrap().push(Route {
            method,
            fragment: fragment.to_string(),
            form_match: Some((key.to_string(), value.to_string())),
            replies: replies.into(),
        });
    }

    pub fn requests(&self) -> Vec<OutgoingRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: HttpMethod, fragment: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.contains(fragment))
            .count()
    }

    pub fn posts(&self, fragment: &str) -> Vec<OutgoingRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == HttpMethod::Post && r.url.contains(fragment))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HttpBackend for ScriptedBackend {
    async fn execute(&self, request: &OutgoingRequest) -> Result<RawResponse, NetworkError> {
        self.requests.lock().unwrap().push(request.clone());

        let mut routes = self.routes.lock().unwrap();
        let Some(route) = routes.iter_mut().find(|r| r.matches(request)) else {
            return status(404);
        };
        if route.replies.len() > 1 {
            route.replies.pop_front().unwrap_or_else(|| status(404))
        } else {
            route.replies.front().cloned().unwrap_or_else(|| status(404))
        }
    }
}

pub const PLACE: &str = "screen=place";
pub const PREPARE: &str = "screen=place&try=confirm";
pub const CONFIRM: &str = "screen=place&action=command";

/// The standard happy path: inventory and token from the place screen,
/// a confirmation form, then success.
pub fn script_happy_path(backend: &ScriptedBackend) {
    backend.on(HttpMethod::Get, PLACE, vec![ok(PLACE_PAGE)]);
    backend.on(HttpMethod::Post, PREPARE, vec![ok(CONFIRM_PAGE)]);
    backend.on(HttpMethod::Post, CONFIRM, vec![ok(SUCCESS_PAGE)]);
}

/// Fast settings: no spacing, tiny backoff, no pacing between entries.
pub fn runner_config() -> RunnerConfig {
    toml::from_str(
        r#"
        [http]
        base_url = "https://world.example.test"
        min_interval_ms = 0
        backoff_base_ms = 5
        max_backoff_ms = 20
        max_retries = 2
        timeout_ms = 1000

        [queue]
        base_delay_ms = 0
        jitter_ms = 0
        max_attempts = 3
        "#,
    )
    .unwrap()
}

pub fn troops(pairs: &[(&str, i64)]) -> TroopMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

pub fn attack_at(x: i32, y: i32) -> AttackRequest {
    AttackRequest::new(
        ORIGIN,
        Coordinates::new(x, y),
        troops(&[("light", 50), ("spy", 1)]),
        CommandType::Attack,
    )
    .with_origin_coords(Coordinates::new(480, 480))
}

pub fn reference_attack() -> AttackRequest {
    attack_at(500, 500)
}
