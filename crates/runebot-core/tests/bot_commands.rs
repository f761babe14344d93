//! End-to-end chat command tests against a bot with on-disk stores.

use pretty_assertions::assert_eq;
use runebot_core::ChatRole;
use runebot_test_utils::bot::{TEST_CHANNEL, TestBot};
use runebot_test_utils::config::TestConfigBuilder;
use runebot_test_utils::inventory::{FakeInventory, sample_record};
use runebot_test_utils::tracing_setup::init_test_tracing;

#[tokio::test]
async fn status_commands_without_a_current_build() {
    let mut bot = TestBot::new().await;
    assert_eq!(bot.viewer_says("!build").await.as_deref(), Some("No build set."));
    assert_eq!(bot.viewer_says("!rl").await.as_deref(), Some("No build set."));
    assert_eq!(bot.viewer_says("!stats").await.as_deref(), Some("No build set."));
}

#[test_log::test(tokio::test)]
async fn add_set_and_query_a_text_build() {
    let mut bot = TestBot::new().await;

    assert_eq!(
        bot.say("!addbuildfromtext \"Moon Veil\" 125 25 https://inv.test/b?b=1")
            .await
            .as_deref(),
        Some("Build Moon Veil has been added.")
    );
    assert_eq!(
        bot.say("!setbuild Moon Veil").await.as_deref(),
        Some("Current build has been set to Moon Veil.")
    );

    assert_eq!(
        bot.viewer_says("!build").await.as_deref(),
        Some("Moon Veil RL125 +25/+10 Link: https://inv.test/b?b=1")
    );
    assert_eq!(bot.viewer_says("!RL").await.as_deref(), Some("RL125"));
    assert_eq!(bot.viewer_says("!sl").await.as_deref(), Some("RL125"));

    // Text builds carry no stats, so !stats stays silent
    assert_eq!(bot.viewer_says("!stats").await, None);
}

#[tokio::test]
async fn describe_omits_link_when_absent() {
    let mut bot = TestBot::new().await;
    bot.say("!addbuildfromtext Bleed 42 10").await;
    bot.say("!setbuild Bleed").await;
    assert_eq!(bot.viewer_says("!build").await.as_deref(), Some("Bleed RL42 +10/+4"));
}

#[tokio::test]
async fn duplicate_and_missing_names_reply_verbatim() {
    let mut bot = TestBot::new().await;
    bot.say("!addbuildfromtext dup 10 1").await;

    assert_eq!(
        bot.say("!addbuildfromtext dup 99 9").await.as_deref(),
        Some("A build with this name already exists!")
    );
    assert_eq!(
        bot.say("!removebuild ghost").await.as_deref(),
        Some("A build with this name is not found!")
    );
    assert_eq!(
        bot.say("!setbuild ghost").await.as_deref(),
        Some("A build with this name is not found!")
    );

    // The original build is untouched
    bot.say("!setbuild dup").await;
    assert_eq!(bot.viewer_says("!rl").await.as_deref(), Some("RL10"));
}

#[tokio::test]
async fn malformed_text_build_is_rejected() {
    let mut bot = TestBot::new().await;
    for body in [
        "!addbuildfromtext",
        "!addbuildfromtext onlyname",
        "!addbuildfromtext name x 25",
        "!addbuildfromtext name 100 25 link extra",
    ] {
        let reply = bot.say(body).await.unwrap();
        assert!(reply.starts_with("Invalid build:"), "{body}: {reply}");
    }
    assert!(bot.bot.builds().registry(TEST_CHANNEL).is_none());
}

#[tokio::test]
async fn removing_the_current_build_clears_it() {
    let mut bot = TestBot::new().await;
    bot.say("!addbuildfromtext x 100 20").await;
    bot.say("!setbuild x").await;

    assert_eq!(
        bot.say("!removebuild x").await.as_deref(),
        Some("Build x has been removed.")
    );
    assert_eq!(bot.viewer_says("!build").await.as_deref(), Some("No build set."));
}

#[tokio::test]
async fn remote_build_is_fetched_with_stats() {
    let inventory = FakeInventory::new().with_record("r1", sample_record("Str Colossal", 150, 24));
    let mut bot = TestBot::with(TestConfigBuilder::new(), inventory).await;
    let link = FakeInventory::link("r1");

    assert_eq!(
        bot.say(&format!("!addbuild {link}")).await.as_deref(),
        Some("Build Str Colossal has been added.")
    );
    bot.say("!setbuild Str Colossal").await;

    assert_eq!(
        bot.viewer_says("!build").await,
        Some(format!("Str Colossal RL150 +24/+10 Link: {link}"))
    );
    assert_eq!(
        bot.viewer_says("!stats").await.as_deref(),
        Some("VIG 40 MND 12 END 25 STR 16 DEX 45 INT 9 FTH 8 ARC 7")
    );
    assert_eq!(bot.inventory.requests(), 1);
}

#[tokio::test]
async fn remote_fetch_failure_is_generic() {
    let mut bot = TestBot::new().await;
    let reply = bot
        .say(&format!("!addbuild {}", FakeInventory::link("missing")))
        .await;
    assert_eq!(reply.as_deref(), Some("Could not fetch that build."));
}

#[tokio::test]
async fn viewers_cannot_mutate() {
    let mut bot = TestBot::new().await;
    assert_eq!(bot.viewer_says("!addbuildfromtext x 1 1").await, None);
    assert_eq!(bot.viewer_says("!adddc").await, None);
    assert_eq!(bot.viewer_says("!setdc 3").await, None);
    assert!(bot.bot.builds().registry(TEST_CHANNEL).is_none());

    // Moderators can
    let reply = bot
        .say_as("mod", ChatRole::Moderator, "!addbuildfromtext x 1 1")
        .await;
    assert_eq!(reply.as_deref(), Some("Build x has been added."));
}

#[tokio::test]
async fn unknown_commands_and_chatter_are_ignored() {
    let mut bot = TestBot::new().await;
    assert_eq!(bot.say("!dance").await, None);
    assert_eq!(bot.say("just chatting").await, None);
    assert_eq!(
        bot.viewer_says("!hi").await.as_deref(),
        Some("Ayo @viewer!")
    );
}

#[tokio::test]
async fn custom_prefix() {
    let mut bot = TestBot::with(TestConfigBuilder::new().prefix("?"), FakeInventory::new()).await;
    assert_eq!(bot.viewer_says("!hi").await, None);
    assert_eq!(bot.viewer_says("?hi").await.as_deref(), Some("Ayo @viewer!"));
}

#[tokio::test]
async fn builds_link_uses_channel_user_id() {
    let config = TestConfigBuilder::new()
        .browse_url("https://inventory.test/browse/")
        .inventory_user("TestStream", "u-42");
    let mut bot = TestBot::with(config, FakeInventory::new()).await;
    assert_eq!(
        bot.viewer_says("!builds").await.as_deref(),
        Some("You can find my public builds here: https://inventory.test/browse/u-42")
    );
}

#[tokio::test]
async fn level_estimates_from_bundled_data() {
    let mut bot = TestBot::new().await;
    assert_eq!(
        bot.viewer_says("!level 5000").await.as_deref(),
        Some("5000 runes as host: closest RL138")
    );
    assert_eq!(
        bot.viewer_says("!level 5_000 invader").await.as_deref(),
        Some("5000 runes as invader: closest RL76")
    );
    assert_eq!(
        bot.viewer_says("!level 123,456 Bloody_Finger").await.as_deref(),
        Some("123456 runes as bloody-finger: closest RL297")
    );
    assert_eq!(
        bot.viewer_says("!level 0 cooperator").await.as_deref(),
        Some("0 runes as cooperator: closest RL2")
    );
    assert_eq!(
        bot.viewer_says("!level 1000000000").await.as_deref(),
        Some("1000000000 runes as host: closest RL713")
    );
}

#[tokio::test]
async fn disconnect_counter() {
    let mut bot = TestBot::new().await;
    assert_eq!(bot.viewer_says("!dc").await.as_deref(), Some("Disconnects: 0"));
    assert_eq!(bot.say("!adddc").await.as_deref(), Some("Disconnects: 1"));
    assert_eq!(bot.say("!adddc").await.as_deref(), Some("Disconnects: 2"));
    assert_eq!(bot.say("!setdc 10").await.as_deref(), Some("Disconnects: 10"));
    assert_eq!(bot.say("!setdc ten").await.as_deref(), Some("Usage: !setdc <count>"));
    assert_eq!(bot.viewer_says("!dc").await.as_deref(), Some("Disconnects: 10"));
}

#[tokio::test]
async fn state_survives_restart() {
    init_test_tracing();
    let mut bot = TestBot::new().await;
    bot.say("!addbuildfromtext a 50 5").await;
    bot.say("!addbuildfromtext \"b c\" 60 6").await;
    bot.say("!setbuild b c").await;
    bot.say("!adddc").await;

    bot.restart().await;

    let registry = bot.bot.builds().registry(TEST_CHANNEL).unwrap();
    assert_eq!(registry.to_string(), "a, b c*");
    assert_eq!(bot.viewer_says("!rl").await.as_deref(), Some("RL60"));
    assert_eq!(bot.viewer_says("!dc").await.as_deref(), Some("Disconnects: 1"));

    let raw = tokio::fs::read_to_string(&bot.builds_path).await.unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["teststream"]["current_build"]["name"], "b c");
}

#[tokio::test]
async fn unwritable_store_rolls_back() {
    let mut bot = TestBot::new().await;
    bot.say("!addbuildfromtext keep 10 1").await;

    // Replace the document's location with a directory so the rename fails
    tokio::fs::remove_file(&bot.builds_path).await.unwrap();
    tokio::fs::create_dir(&bot.builds_path).await.unwrap();

    assert_eq!(
        bot.say("!addbuildfromtext lost 20 2").await.as_deref(),
        Some("Could not save builds, try again later.")
    );
    let registry = bot.bot.builds().registry(TEST_CHANNEL).unwrap();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["keep"]);
}
