use forum_core::{
    update, ExtractMode, Freshness, ListingPage, Msg, PageData, PageRequest, PostRecord,
    ReaderState, ReaderStatus, RequestKind, ThreadPage, ThreadSummary,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    forum_logging::initialize_for_tests();
}

fn summary(id: &str, title: &str) -> ThreadSummary {
    ThreadSummary {
        id: id.to_string(),
        title: title.to_string(),
        author_name: "a".to_string(),
        author_uid: "1".to_string(),
        post_date: String::new(),
        reply_count: 1,
        view_count: 2,
        last_poster_name: String::new(),
        last_post_time: String::new(),
        thread_page_count: 1,
    }
}

fn post(pid: &str, author: &str, page: u32) -> PostRecord {
    PostRecord {
        thread_id: "500".to_string(),
        post_id: pid.to_string(),
        page_number: page,
        rich_content: format!("<p>{pid}</p>"),
        plain_text: pid.to_string(),
        author_name: author.to_string(),
        post_time: String::new(),
    }
}

fn thread_page(current: u32, last: u32, posts: Vec<PostRecord>) -> PageData {
    PageData::Thread(ThreadPage {
        thread_id: "500".to_string(),
        posts,
        current_page: current,
        last_page: last,
        mode: ExtractMode::Full,
        skipped_posts: 0,
    })
}

fn thread_feed() -> RequestKind {
    RequestKind::Thread {
        thread_id: "500".to_string(),
        mode: ExtractMode::Full,
    }
}

#[test]
fn listing_pages_accumulate_in_page_order() {
    init_logging();
    let (state, _) = update(
        ReaderState::new(),
        Msg::Open(RequestKind::Listing {
            forum_id: "2".into(),
        }),
    );
    let page = |current: u32, ids: &[&str]| {
        PageData::Listing(ListingPage {
            threads: ids.iter().map(|id| summary(id, id)).collect(),
            current_page: current,
            next_page_locator: Some(format!("page={}", current + 1)),
            last_page: 5,
            skipped_rows: 0,
        })
    };

    let (state, _) = update(
        state,
        Msg::PageLoaded {
            request: PageRequest::listing("2", 1),
            page: page(1, &["1", "2"]),
            freshness: Freshness::Fresh,
        },
    );
    let (state, _) = update(state, Msg::LoadNextPage);
    let (state, _) = update(
        state,
        Msg::PageLoaded {
            request: PageRequest::listing("2", 2),
            page: page(2, &["3"]),
            freshness: Freshness::Fresh,
        },
    );

    let ids: Vec<_> = state.view().threads.iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(state.view().current_page, 2);
    assert_eq!(state.view().last_page, 5);
}

#[test]
fn stale_then_fresh_delivery_replaces_instead_of_duplicating() {
    init_logging();
    let (state, _) = update(
        ReaderState::new(),
        Msg::Open(RequestKind::Listing {
            forum_id: "2".into(),
        }),
    );
    let request = PageRequest::listing("2", 1);
    let stale = PageData::Listing(ListingPage {
        threads: vec![summary("1", "old title")],
        current_page: 1,
        next_page_locator: None,
        last_page: 1,
        skipped_rows: 0,
    });
    let fresh = PageData::Listing(ListingPage {
        threads: vec![summary("1", "new title"), summary("2", "another")],
        current_page: 1,
        next_page_locator: None,
        last_page: 1,
        skipped_rows: 0,
    });

    let (state, _) = update(
        state,
        Msg::PageLoaded {
            request: request.clone(),
            page: stale,
            freshness: Freshness::Stale,
        },
    );
    // Still waiting for the refresh.
    assert_eq!(state.status(), ReaderStatus::Loading);
    assert_eq!(state.view().threads.len(), 1);

    let (state, _) = update(
        state,
        Msg::PageLoaded {
            request,
            page: fresh,
            freshness: Freshness::Fresh,
        },
    );
    let view = state.view();
    assert_eq!(view.status, ReaderStatus::Ready);
    assert_eq!(view.threads.len(), 2);
    assert_eq!(view.threads[0].title, "new title");
    assert_eq!(view.freshness, Some(Freshness::Fresh));
}

#[test]
fn thread_last_page_never_shrinks() {
    init_logging();
    let (state, _) = update(ReaderState::new(), Msg::Open(thread_feed()));
    let (state, _) = update(
        state,
        Msg::PageLoaded {
            request: PageRequest::thread("500", 1, ExtractMode::Full),
            page: thread_page(1, 4, vec![post("1", "op", 1)]),
            freshness: Freshness::Fresh,
        },
    );
    let (state, _) = update(state, Msg::LoadNextPage);
    let (state, _) = update(
        state,
        Msg::PageLoaded {
            request: PageRequest::thread("500", 2, ExtractMode::Full),
            // A stale label on page two claims fewer pages.
            page: thread_page(2, 2, vec![post("2", "other", 2)]),
            freshness: Freshness::Fresh,
        },
    );

    assert_eq!(state.view().last_page, 4);
    assert!(state.view().has_more);
}

#[test]
fn only_author_filter_keeps_thread_starter_posts() {
    init_logging();
    let (state, _) = update(ReaderState::new(), Msg::Open(thread_feed()));
    let (state, _) = update(
        state,
        Msg::PageLoaded {
            request: PageRequest::thread("500", 1, ExtractMode::Full),
            page: thread_page(
                1,
                1,
                vec![post("1", "op", 1), post("2", "reply", 1), post("3", "op", 1)],
            ),
            freshness: Freshness::Fresh,
        },
    );
    assert_eq!(state.view().thread_author.as_deref(), Some("op"));
    assert_eq!(state.view().posts.len(), 3);

    let (state, _) = update(state, Msg::ToggleOnlyAuthor);
    let pids: Vec<_> = state
        .view()
        .posts
        .iter()
        .map(|p| p.post_id.clone())
        .collect();
    assert_eq!(pids, vec!["1", "3"]);

    let (state, _) = update(state, Msg::ToggleOnlyAuthor);
    assert_eq!(state.view().posts.len(), 3);
}

#[test]
fn only_author_preference_survives_reopen() {
    init_logging();
    let (state, _) = update(ReaderState::new(), Msg::ToggleOnlyAuthor);
    let (state, _) = update(state, Msg::Open(thread_feed()));
    assert!(state.view().only_author);
}
