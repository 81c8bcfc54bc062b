use gatormarket::session::SessionClient;
use gatormarket::store::{ClientStateStore, MemoryStore};
use gatormarket::test_utils::MockHttpClient;
use gatormarket::types::events::EventBus;
use gatormarket::types::user::AuthUser;
use gatormarket::types::wishlist::WishlistEntry;
use gatormarket::wishlist::WishlistReconciler;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    http: Arc<MockHttpClient>,
    store: Arc<MemoryStore>,
    wishlist: Arc<WishlistReconciler>,
}

async fn fixture() -> Fixture {
    let http = Arc::new(MockHttpClient::new());
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::new());
    let session = Arc::new(SessionClient::new(
        "http://test",
        Duration::from_secs(5),
        http.clone(),
        store.clone(),
        bus.clone(),
    ));
    session
        .attach(
            "tok".to_string(),
            AuthUser {
                user_id: 1,
                username: "buyer".to_string(),
                email: None,
            },
        )
        .await
        .unwrap();
    let wishlist = Arc::new(WishlistReconciler::new(session, store.clone(), bus));
    wishlist.bind_user(1).await;
    Fixture {
        http,
        store,
        wishlist,
    }
}

fn entry(product_id: i64, name: &str) -> WishlistEntry {
    WishlistEntry {
        product_id,
        user_id: 1,
        name: name.to_string(),
        price: 25.0,
        condition: Some("Good".to_string()),
        description: None,
        rating: 0.0,
    }
}

#[tokio::test]
async fn remote_list_replaces_cache_and_is_persisted() {
    let f = fixture().await;

    f.http.script_json(
        "GET",
        "/wishlist/user",
        200,
        &json!([
            {"product_id": 11, "name": "Couch"},
            {"product_id": 12, "name": "Monitor"},
        ]),
    );

    f.wishlist.load_remote().await.unwrap();
    assert!(f.wishlist.is_wishlisted(11));
    assert!(f.wishlist.is_wishlisted(12));

    let persisted = f.store.load_wishlist(1).await.unwrap();
    assert_eq!(persisted.len(), 2);
}

#[tokio::test]
async fn stale_remote_response_loses_to_a_concurrent_toggle() {
    let f = fixture().await;

    // The remote still thinks product 11 is wishlisted; the response only
    // lands after the local toggle below has removed it.
    f.http.script_json_delayed(
        "GET",
        "/wishlist/user",
        200,
        &json!([{"product_id": 11, "name": "Couch"}]),
        Duration::from_millis(100),
    );
    f.http
        .script_json("POST", "/wishlist/add", 200, &json!({"success": true}));
    f.http.script_json(
        "DELETE",
        "/wishlist/remove/11",
        200,
        &json!({"success": true}),
    );

    f.wishlist.toggle(entry(11, "Couch")).await;
    assert!(f.wishlist.is_wishlisted(11));

    let load = {
        let wishlist = f.wishlist.clone();
        tokio::spawn(async move { wishlist.load_remote().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    f.wishlist.toggle(entry(11, "Couch")).await;

    load.await.unwrap().unwrap();
    // The in-flight remote list predates the removal; it must not
    // resurrect the entry.
    assert!(!f.wishlist.is_wishlisted(11));
}

#[tokio::test]
async fn toggle_syncs_the_remote_list_in_the_background() {
    let f = fixture().await;
    f.http
        .script_json("POST", "/wishlist/add", 200, &json!({"success": true}));
    f.http.script_json(
        "DELETE",
        "/wishlist/remove/21",
        200,
        &json!({"success": true}),
    );

    f.wishlist.toggle(entry(21, "Lamp")).await;
    f.wishlist.toggle(entry(21, "Lamp")).await;

    // The syncs run on spawned tasks; give them a moment to land.
    for _ in 0..50 {
        if f.http.request_count("POST", "/wishlist/add") == 1
            && f.http.request_count("DELETE", "/wishlist/remove/21") == 1
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(f.http.request_count("POST", "/wishlist/add"), 1);
    assert_eq!(f.http.request_count("DELETE", "/wishlist/remove/21"), 1);

    let body: serde_json::Value = serde_json::from_slice(
        f.http
            .requests()
            .iter()
            .find(|r| r.method == "POST")
            .unwrap()
            .body
            .as_ref()
            .unwrap(),
    )
    .unwrap();
    assert_eq!(body, json!({"product_id": 21}));
}

#[tokio::test]
async fn unbind_clears_the_cache_but_not_the_persisted_blob() {
    let f = fixture().await;
    f.http
        .script_json("POST", "/wishlist/add", 200, &json!({"success": true}));

    f.wishlist.toggle(entry(31, "Chair")).await;
    f.wishlist.unbind();

    assert!(!f.wishlist.is_wishlisted(31));
    // The blob survives under the user's key for the next login.
    assert_eq!(f.store.load_wishlist(1).await.unwrap().len(), 1);
}
