//! In-memory blog app used to exercise the runner without a browser.
//!
//! The fixture endpoints are served by wiremock and mutate the same store
//! the fake pages render from, so resets and seeded users behave like the
//! real application.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blogapp_e2e::{
    normalize_text, DialogPolicy, E2eError, E2eResult, ElementState, Locator, NewUser, Query,
    Session, SessionFactory,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[derive(Debug, Clone)]
pub struct Blog {
    pub id: u64,
    pub title: String,
    pub author: String,
    pub url: String,
    pub likes: u32,
    pub creator: String,
}

#[derive(Debug, Default)]
pub struct Store {
    pub users: Vec<NewUser>,
    pub blogs: Vec<Blog>,
    pub resets: usize,
    next_id: u64,
}

pub type SharedStore = Arc<Mutex<Store>>;

/// Deliberate application bugs
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Show `remove` on every expanded blog, not only the creator's
    pub remove_for_everyone: bool,
    /// `sort by likes` does nothing
    pub sort_ignored: bool,
}

struct ResetResponder(SharedStore);

impl Respond for ResetResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let mut store = self.0.lock().unwrap();
        store.users.clear();
        store.blogs.clear();
        store.resets += 1;
        ResponseTemplate::new(204)
    }
}

struct CreateUserResponder(SharedStore);

impl Respond for CreateUserResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let user: NewUser = match request.body_json() {
            Ok(user) => user,
            Err(_) => return ResponseTemplate::new(400),
        };
        let mut store = self.0.lock().unwrap();
        if store.users.iter().any(|u| u.username == user.username) {
            return ResponseTemplate::new(400).set_body_string("expected `username` to be unique");
        }
        store.users.push(user);
        ResponseTemplate::new(201)
    }
}

/// Serve reset, user creation and the root page from `store`
pub async fn mount_api(server: &MockServer, store: SharedStore) {
    Mock::given(method("POST"))
        .and(path("/api/testing/reset"))
        .respond_with(ResetResponder(store.clone()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users"))
        .respond_with(CreateUserResponder(store))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<!doctype html>"))
        .mount(server)
        .await;
}

/// Session factory over a shared fake application
#[derive(Clone, Default)]
pub struct FakeBlogApp {
    pub store: SharedStore,
    pub faults: Faults,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeBlogApp {
    pub fn with_faults(faults: Faults) -> Self {
        Self {
            faults,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FakeBlogApp {
    async fn open(&self, _base_url: &str) -> E2eResult<Box<dyn Session>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage::new(self.clone())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    ShowLogin,
    HideLogin,
    SubmitLogin,
    Logout,
    ShowBlogForm,
    HideBlogForm,
    CreateBlog,
    Toggle(u64),
    Like(u64),
    Remove(u64),
    Sort,
}

#[derive(Debug, Clone)]
struct Node {
    tag: &'static str,
    text: String,
    test_id: Option<&'static str>,
    hidden: bool,
    action: Option<Action>,
    children: Vec<Node>,
}

impl Node {
    fn el(tag: &'static str) -> Self {
        Self {
            tag,
            text: String::new(),
            test_id: None,
            hidden: false,
            action: None,
            children: Vec::new(),
        }
    }

    fn text(tag: &'static str, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::el(tag)
        }
    }

    fn button(label: &str, action: Action) -> Self {
        Self {
            action: Some(action),
            ..Self::text("button", label)
        }
    }

    fn input(test_id: &'static str) -> Self {
        Self {
            test_id: Some(test_id),
            ..Self::el("input")
        }
    }

    fn hidden_if(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    fn with(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    fn to_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.tag);
        if let Some(id) = self.test_id {
            out.push_str(&format!(" data-testid=\"{}\"", id));
        }
        if self.hidden {
            out.push_str(" style=\"display: none\"");
        }
        out.push('>');
        out.push_str(&self.text);
        for child in &self.children {
            child.to_html(out);
        }
        out.push_str(&format!("</{}>", self.tag));
    }
}

/// Flattened element in document order
struct Flat {
    tag: &'static str,
    text: String,
    test_id: Option<&'static str>,
    visible: bool,
    action: Option<Action>,
    parent: Option<usize>,
    children: Vec<usize>,
}

fn flatten(node: &Node, parent: Option<usize>, parent_visible: bool, out: &mut Vec<Flat>) -> usize {
    let idx = out.len();
    let visible = parent_visible && !node.hidden;
    out.push(Flat {
        tag: node.tag,
        text: node.text.clone(),
        test_id: node.test_id,
        visible,
        action: node.action,
        parent,
        children: Vec::new(),
    });
    for child in &node.children {
        let c = flatten(child, Some(idx), visible, out);
        out[idx].children.push(c);
    }
    idx
}

fn descendants(dom: &[Flat], idx: usize, out: &mut Vec<usize>) {
    for &c in &dom[idx].children {
        out.push(c);
        descendants(dom, c, out);
    }
}

fn full_text(dom: &[Flat], idx: usize, visible_only: bool) -> String {
    let mut parts = Vec::new();
    if !dom[idx].text.is_empty() {
        parts.push(dom[idx].text.clone());
    }
    for &c in &dom[idx].children {
        if visible_only && !dom[c].visible {
            continue;
        }
        let t = full_text(dom, c, visible_only);
        if !t.is_empty() {
            parts.push(t);
        }
    }
    normalize_text(&parts.join(" "))
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    normalize_text(haystack)
        .to_lowercase()
        .contains(&normalize_text(needle).to_lowercase())
}

fn role_of(tag: &str) -> Option<&'static str> {
    match tag {
        "button" => Some("button"),
        "input" => Some("textbox"),
        "ul" => Some("list"),
        "li" => Some("listitem"),
        _ => None,
    }
}

fn matches_root(dom: &[Flat], idx: usize, query: &Query) -> bool {
    let el = &dom[idx];
    match query {
        Query::Css(selector) => {
            let parts: Vec<&str> = selector.split('>').map(str::trim).collect();
            match parts.as_slice() {
                [tag] => el.tag == *tag,
                [parent, tag] => {
                    el.tag == *tag && el.parent.map(|p| dom[p].tag == *parent).unwrap_or(false)
                }
                _ => false,
            }
        }
        // Hidden elements are not in the accessibility tree
        Query::Role { role, name, exact } => {
            el.visible
                && role_of(el.tag) == Some(role.as_str())
                && match name {
                    None => true,
                    Some(name) if *exact => full_text(dom, idx, true) == normalize_text(name),
                    Some(name) => contains_ci(&full_text(dom, idx, true), name),
                }
        }
        Query::TestId(id) => el.test_id == Some(id.as_str()),
        Query::Text(text) => !el.text.is_empty() && contains_ci(&el.text, text),
        Query::TextExact(text) => normalize_text(&el.text) == normalize_text(text),
        Query::HasText(_) | Query::Nth(_) => false,
    }
}

fn resolve(dom: &[Flat], locator: &Locator) -> Vec<usize> {
    let mut current: Option<Vec<usize>> = None;
    for query in locator.queries() {
        let next = match query {
            Query::HasText(text) => current
                .unwrap_or_default()
                .into_iter()
                .filter(|&i| contains_ci(&full_text(dom, i, false), text))
                .collect(),
            Query::Nth(n) => current.unwrap_or_default().into_iter().nth(*n).into_iter().collect(),
            root => {
                let scopes = current.unwrap_or_else(|| vec![0]);
                let mut found = Vec::new();
                for scope in scopes {
                    let mut below = Vec::new();
                    descendants(dom, scope, &mut below);
                    found.extend(below.into_iter().filter(|&i| matches_root(dom, i, root)));
                }
                found.sort_unstable();
                found.dedup();
                found
            }
        };
        current = Some(next);
    }
    current.unwrap_or_default()
}

/// One browser page on the fake app
pub struct FakePage {
    app: FakeBlogApp,
    loaded: bool,
    user: Option<String>,
    login_open: bool,
    blog_form_open: bool,
    inputs: HashMap<&'static str, String>,
    // Only one blog shows its details at a time
    expanded: Option<u64>,
    order: Vec<u64>,
    notification: Option<String>,
    policy: DialogPolicy,
    pub dialogs: Vec<String>,
    closed: bool,
}

impl FakePage {
    fn new(app: FakeBlogApp) -> Self {
        Self {
            app,
            loaded: false,
            user: None,
            login_open: false,
            blog_form_open: false,
            inputs: HashMap::new(),
            expanded: None,
            order: Vec::new(),
            notification: None,
            policy: DialogPolicy::Dismiss,
            dialogs: Vec::new(),
            closed: false,
        }
    }

    fn ensure_open(&self) -> E2eResult<()> {
        if self.closed {
            return Err(E2eError::Driver("page closed".into()));
        }
        Ok(())
    }

    fn tree(&mut self) -> Node {
        let store = self.app.store.lock().unwrap();
        self.order.retain(|id| store.blogs.iter().any(|b| b.id == *id));
        for blog in &store.blogs {
            if !self.order.contains(&blog.id) {
                self.order.push(blog.id);
            }
        }

        let mut body = Node::el("body");
        if !self.loaded {
            return body;
        }

        if let Some(message) = &self.notification {
            body.children.push(Node::text("div", message.clone()));
        }

        let Some(username) = &self.user else {
            body.children.push(
                Node::el("div")
                    .hidden_if(self.login_open)
                    .with(vec![Node::button("login", Action::ShowLogin)]),
            );
            body.children.push(Node::el("form").hidden_if(!self.login_open).with(vec![
                Node::input("username"),
                Node::input("password"),
                Node::button("Login", Action::SubmitLogin),
                Node::button("cancel", Action::HideLogin),
            ]));
            return body;
        };

        let display_name = |username: &str| {
            store
                .users
                .iter()
                .find(|u| u.username == username)
                .map(|u| u.name.clone())
                .unwrap_or_default()
        };

        body.children.push(Node::el("div").with(vec![
            Node::text("span", format!("{} logged in", display_name(username))),
            Node::button("logout", Action::Logout),
        ]));
        body.children.push(
            Node::el("div")
                .hidden_if(self.blog_form_open)
                .with(vec![Node::button("new blog", Action::ShowBlogForm)]),
        );
        body.children.push(Node::el("form").hidden_if(!self.blog_form_open).with(vec![
            Node::input("title"),
            Node::input("author"),
            Node::input("url"),
            Node::button("create", Action::CreateBlog),
            Node::button("cancel", Action::HideBlogForm),
        ]));
        body.children.push(Node::button("sort by likes", Action::Sort));

        let mut list = Node::el("ul");
        for id in &self.order {
            let Some(blog) = store.blogs.iter().find(|b| b.id == *id) else {
                continue;
            };
            let expanded = self.expanded == Some(blog.id);
            let mut item = Node::text("li", format!("{} {}", blog.title, blog.author));
            item.children.push(Node::button(
                if expanded { "hide" } else { "view" },
                Action::Toggle(blog.id),
            ));
            if expanded {
                item.children.push(Node::text("div", blog.url.clone()));
                item.children.push(
                    Node::text("div", format!("likes: {}", blog.likes))
                        .with(vec![Node::button("like", Action::Like(blog.id))]),
                );
                item.children.push(Node::text("div", display_name(&blog.creator)));
                if blog.creator == *username || self.app.faults.remove_for_everyone {
                    item.children.push(Node::button("remove", Action::Remove(blog.id)));
                }
            }
            list.children.push(item);
        }
        body.children.push(list);
        body
    }

    fn dom(&mut self) -> Vec<Flat> {
        let tree = self.tree();
        let mut dom = Vec::new();
        flatten(&tree, None, true, &mut dom);
        dom
    }

    /// The single visible element a locator points at
    fn target(&mut self, locator: &Locator) -> E2eResult<(Option<Action>, Option<&'static str>)> {
        self.ensure_open()?;
        let dom = self.dom();
        let visible: Vec<usize> = resolve(&dom, locator)
            .into_iter()
            .filter(|&i| dom[i].visible)
            .collect();
        match visible.as_slice() {
            [only] => Ok((dom[*only].action, dom[*only].test_id)),
            other => Err(E2eError::Driver(format!(
                "{} resolved to {} visible elements",
                locator,
                other.len()
            ))),
        }
    }

    fn take_input(&mut self, id: &str) -> String {
        self.inputs.remove(id).unwrap_or_default()
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::ShowLogin => self.login_open = true,
            Action::HideLogin => self.login_open = false,
            Action::SubmitLogin => {
                let username = self.take_input("username");
                let password = self.take_input("password");
                let ok = self
                    .app
                    .store
                    .lock()
                    .unwrap()
                    .users
                    .iter()
                    .any(|u| u.username == username && u.password == password);
                if ok {
                    self.user = Some(username);
                    self.login_open = false;
                    self.notification = None;
                } else {
                    self.notification = Some("Invalid username or password".into());
                }
            }
            Action::Logout => {
                self.user = None;
                self.login_open = false;
                self.blog_form_open = false;
            }
            Action::ShowBlogForm => self.blog_form_open = true,
            Action::HideBlogForm => self.blog_form_open = false,
            Action::CreateBlog => {
                let title = self.take_input("title");
                let author = self.take_input("author");
                let url = self.take_input("url");
                let creator = self.user.clone().unwrap_or_default();
                let mut store = self.app.store.lock().unwrap();
                store.next_id += 1;
                let id = store.next_id;
                store.blogs.push(Blog {
                    id,
                    title,
                    author,
                    url,
                    likes: 0,
                    creator,
                });
                self.blog_form_open = false;
            }
            Action::Toggle(id) => {
                self.expanded = if self.expanded == Some(id) { None } else { Some(id) };
            }
            Action::Like(id) => {
                let mut store = self.app.store.lock().unwrap();
                if let Some(blog) = store.blogs.iter_mut().find(|b| b.id == id) {
                    blog.likes += 1;
                }
            }
            Action::Remove(id) => {
                let mut store = self.app.store.lock().unwrap();
                let Some(blog) = store.blogs.iter().find(|b| b.id == id) else {
                    return;
                };
                self.dialogs
                    .push(format!("Remove blog {} by {}", blog.title, blog.author));
                if self.policy == DialogPolicy::Accept {
                    store.blogs.retain(|b| b.id != id);
                    self.expanded = None;
                }
            }
            Action::Sort => {
                if self.app.faults.sort_ignored {
                    return;
                }
                let store = self.app.store.lock().unwrap();
                let likes = |id: &u64| {
                    store
                        .blogs
                        .iter()
                        .find(|b| b.id == *id)
                        .map(|b| b.likes)
                        .unwrap_or(0)
                };
                // Stable, so ties keep their current order
                self.order.sort_by(|a, b| likes(b).cmp(&likes(a)));
            }
        }
    }
}

#[async_trait]
impl Session for FakePage {
    async fn goto(&mut self, _url: &str) -> E2eResult<()> {
        self.ensure_open()?;
        self.loaded = true;
        self.login_open = false;
        self.blog_form_open = false;
        self.inputs.clear();
        self.notification = None;
        Ok(())
    }

    async fn query(&mut self, locator: &Locator) -> E2eResult<Vec<ElementState>> {
        self.ensure_open()?;
        let dom = self.dom();
        Ok(resolve(&dom, locator)
            .into_iter()
            .map(|i| ElementState {
                visible: dom[i].visible,
                text: full_text(&dom, i, dom[i].visible),
            })
            .collect())
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        if let (Some(action), _) = self.target(locator)? {
            self.apply(action);
        }
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        match self.target(locator)? {
            (_, Some(id)) => {
                self.inputs.insert(id, value.to_string());
                Ok(())
            }
            _ => Err(E2eError::Driver(format!("{} is not an input", locator))),
        }
    }

    async fn set_dialog_policy(&mut self, policy: DialogPolicy) -> E2eResult<()> {
        self.ensure_open()?;
        self.policy = policy;
        Ok(())
    }

    async fn content(&mut self) -> E2eResult<String> {
        self.ensure_open()?;
        let mut html = String::new();
        self.tree().to_html(&mut html);
        Ok(html)
    }

    async fn screenshot(&mut self, _path: &Path) -> E2eResult<bool> {
        Ok(false)
    }

    async fn close(&mut self) -> E2eResult<()> {
        if !self.closed {
            self.closed = true;
            self.app.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
