//! Built-in blog app scenarios
//!
//! Every scenario starts from a reset database with the two seeded
//! accounts below and a session opened on the application root.

use crate::helpers::{
    blog_item, create_blog, hide_blog, like_blog, login_with, logout, view_blog,
};
use crate::locator::Locator;
use crate::spec::{FixtureSpec, NewUser, Scenario, Step};

pub const CREATOR: (&str, &str, &str) = ("koala", "Sezar", "correct");
pub const OTHER: (&str, &str, &str) = ("adam", "Smith", "correct");

const TEST_BLOG: (&str, &str, &str) = ("ADHD", "Music Group", "adhd.com");

/// Reset plus the two seeded accounts
pub fn seeded_fixtures() -> FixtureSpec {
    FixtureSpec {
        reset: true,
        users: vec![
            NewUser::new(CREATOR.0, CREATOR.1, CREATOR.2),
            NewUser::new(OTHER.0, OTHER.1, OTHER.2),
        ],
    }
}

fn base(name: &str, description: &str, tags: &[&str]) -> Scenario {
    let mut scenario = Scenario::new(name);
    scenario.description = description.to_string();
    scenario.tags = tags.iter().map(|t| t.to_string()).collect();
    scenario.fixtures = seeded_fixtures();
    scenario.setup = vec![Step::navigate("/")];
    scenario
}

/// Same as `base`, logged in as the creating account
fn logged_in(name: &str, description: &str, tags: &[&str]) -> Scenario {
    let mut scenario = base(name, description, tags);
    scenario.setup.extend(login_with(CREATOR.0, CREATOR.2));
    scenario
        .setup
        .push(Step::assert_visible(Locator::text(format!("{} logged in", CREATOR.1))));
    scenario
}

fn login_form_is_shown() -> Scenario {
    let mut s = base("login-form-is-shown", "Login form is shown", &["auth", "smoke"]);
    s.steps = vec![
        Step::click(Locator::button("login")),
        Step::assert_visible(Locator::test_id("username")),
        Step::assert_visible(Locator::test_id("password")),
        Step::assert_visible(Locator::button_exact("Login")),
    ];
    s
}

fn login_succeeds() -> Scenario {
    let mut s = base(
        "login-succeeds-with-correct-credentials",
        "Login succeeds with correct credentials",
        &["auth"],
    );
    s.steps = login_with(CREATOR.0, CREATOR.2);
    s.steps
        .push(Step::assert_visible(Locator::text(format!("{} logged in", CREATOR.1))));
    s
}

fn login_fails() -> Scenario {
    let mut s = base(
        "login-fails-with-wrong-credentials",
        "Login fails with wrong credentials",
        &["auth"],
    );
    s.steps = login_with(CREATOR.0, "wrong");
    s.steps.extend([
        Step::assert_visible(Locator::text("Invalid username or password")),
        Step::assert_not_visible(Locator::text(format!("{} logged in", CREATOR.1))),
    ]);
    s
}

fn blog_can_be_created() -> Scenario {
    let (title, author, url) = TEST_BLOG;
    let mut s = logged_in(
        "logged-in-new-blog-can-be-created",
        "A new blog can be created",
        &["blogs"],
    );
    s.steps = create_blog(title, author, url);
    s.steps
        .push(Step::assert_visible(Locator::text(format!("{} {}", title, author))));
    s
}

fn blog_can_be_liked() -> Scenario {
    let (title, author, url) = TEST_BLOG;
    let mut s = logged_in("logged-in-blog-can-be-liked", "A blog can be liked", &["blogs"]);
    s.steps = create_blog(title, author, url);
    s.steps.extend(view_blog(title, author));
    s.steps.extend(like_blog(title, author, 1));
    s
}

fn blog_can_be_deleted() -> Scenario {
    let (title, author, url) = TEST_BLOG;
    let mut s = logged_in(
        "logged-in-blog-can-be-deleted-by-author",
        "A blog can be deleted by its author",
        &["blogs", "auth"],
    );
    // The confirm() raised by remove must already have a handler
    s.steps = vec![Step::accept_dialogs()];
    s.steps.extend(create_blog(title, author, url));
    s.steps.extend(view_blog(title, author));
    s.steps.extend([
        Step::click(blog_item(title, author).get_button("remove")),
        Step::assert_not_visible(Locator::text(format!("{} {}", title, author))),
    ]);
    s
}

fn only_creator_sees_remove() -> Scenario {
    let (title, author, url) = TEST_BLOG;
    let mut s = logged_in(
        "logged-in-only-creator-sees-remove",
        "Only the user who added the blog sees its remove button",
        &["blogs", "auth"],
    );
    s.steps = create_blog(title, author, url);
    s.steps.extend(view_blog(title, author));
    s.steps
        .push(Step::assert_visible(Locator::css("li").get_button("remove")));
    s.steps.extend(logout());
    s.steps.extend(login_with(OTHER.0, OTHER.2));
    s.steps
        .push(Step::assert_visible(Locator::text(format!("{} logged in", OTHER.1))));
    s.steps.extend([
        Step::assert_visible(blog_item(title, author)),
        Step::assert_not_visible(Locator::css("li").get_button("remove")),
    ]);
    s
}

fn blogs_ordered_by_likes() -> Scenario {
    let url = TEST_BLOG.2;
    let blogs = [
        ("First Blog", "First", 2),
        ("Second Blog", "Second", 3),
        ("Third Blog", "Third", 1),
    ];

    let mut s = logged_in(
        "logged-in-blogs-ordered-by-likes",
        "Blogs are arranged by likes after sorting",
        &["blogs", "sort"],
    );
    for (title, author, _) in blogs {
        s.steps.extend(create_blog(title, author, url));
    }
    for (title, author, likes) in blogs {
        s.steps.extend(view_blog(title, author));
        s.steps.extend(like_blog(title, author, likes));
    }
    s.steps.extend(hide_blog("Third Blog", "Third"));
    s.steps.push(Step::click(Locator::button_exact("sort by likes")));

    let items = Locator::css("ul > li");
    s.steps.push(Step::assert_count(items.clone(), 3));
    for (i, expected) in [
        "Second Blog Second view",
        "First Blog First view",
        "Third Blog Third view",
    ]
    .iter()
    .enumerate()
    {
        s.steps.push(Step::assert_text(items.clone().nth(i), *expected));
    }
    s
}

/// The full blog app suite, in declaration order
pub fn blog_app() -> Vec<Scenario> {
    vec![
        login_form_is_shown(),
        login_succeeds(),
        login_fails(),
        blog_can_be_created(),
        blog_can_be_liked(),
        blog_can_be_deleted(),
        only_creator_sees_remove(),
        blogs_ordered_by_likes(),
    ]
}
