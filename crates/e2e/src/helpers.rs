//! Reusable step sequences for the blog app UI

use crate::locator::{Locator, Query};
use crate::spec::Step;

/// The list item rendering `"<title> <author>"`
pub fn blog_item(title: &str, author: &str) -> Locator {
    Locator::css("li").has_text(format!("{} {}", title, author))
}

/// Open the login form, fill both fields by test id and submit
pub fn login_with(username: &str, password: &str) -> Vec<Step> {
    vec![
        Step::click(Locator::button("login")),
        Step::fill(Locator::test_id("username"), username),
        Step::fill(Locator::test_id("password"), password),
        Step::click(Locator::button_exact("Login")),
    ]
}

pub fn logout() -> Vec<Step> {
    vec![Step::click(Locator::button("logout"))]
}

/// Open the new blog form, fill title/author/url and submit.
///
/// Waits for the entry to show up so consecutive creations don't race.
pub fn create_blog(title: &str, author: &str, url: &str) -> Vec<Step> {
    vec![
        Step::click(Locator::button("new blog")),
        Step::fill(Locator::test_id("title"), title),
        Step::fill(Locator::test_id("author"), author),
        Step::fill(Locator::test_id("url"), url),
        Step::click(Locator::button_exact("create")),
        Step::assert_visible(blog_item(title, author)),
    ]
}

/// Expand the detail view of one blog
pub fn view_blog(title: &str, author: &str) -> Vec<Step> {
    vec![Step::click(blog_item(title, author).get_button("view"))]
}

/// Press `like` on one blog `times` times, checking its counter after
/// each press. Assumes the blog starts at zero likes and is expanded.
pub fn like_blog(title: &str, author: &str, times: usize) -> Vec<Step> {
    (1..=times)
        .flat_map(|n| {
            [
                Step::click(blog_item(title, author).get_button_exact("like")),
                Step::assert_visible(
                    blog_item(title, author).within(Query::Text(format!("likes: {}", n))),
                ),
            ]
        })
        .collect()
}

/// Collapse the detail view of one blog
pub fn hide_blog(title: &str, author: &str) -> Vec<Step> {
    vec![Step::click(blog_item(title, author).get_button_exact("hide"))]
}
