//! Reflex Path Integration Tests

mod common;

use callflow::application::processors::{
    ActivityProcessor, ActivityProcessorFactory, EventLedger, ReflexDispatcher, ACTION_HEADER,
};
use callflow::domain::call::Command;
use callflow::domain::switch::SwitchEvent;
use callflow::FlowError;
use common::ScriptedSwitch;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn factory(switch: Arc<ScriptedSwitch>) -> ActivityProcessorFactory {
    ActivityProcessorFactory::new(switch, Arc::new(EventLedger::new(64)))
}

fn park_event(sequence: u32) -> SwitchEvent {
    SwitchEvent::default()
        .with_header("Event-Name", "CHANNEL_PARK")
        .with_header("Core-UUID", "core-1")
        .with_header("Event-Sequence", sequence.to_string())
        .with_header("Unique-ID", "leg-a")
}

#[test]
fn test_factory_creates_supported_processors() {
    let factory = factory(ScriptedSwitch::new());

    assert_eq!(factory.actions(), vec!["bridge", "hangup", "originate"]);
    assert_eq!(factory.create("bridge").unwrap().action(), "bridge");
    assert_eq!(factory.create("hangup").unwrap().action(), "hangup");
    assert_eq!(factory.create("originate").unwrap().action(), "originate");
}

#[test]
fn test_factory_rejects_unknown_action() {
    let factory = factory(ScriptedSwitch::new());

    match factory.create("unknown") {
        Err(err) => assert_eq!(err, FlowError::UnsupportedAction("unknown".to_string())),
        Ok(_) => panic!("unknown action produced a processor"),
    }
}

#[tokio::test]
async fn test_bridge_processor_issues_bridge_command() {
    let switch = ScriptedSwitch::new();
    let processor = factory(switch.clone()).create("bridge").unwrap();

    let event = park_event(1).with_header("variable_callflow_bridge_to", "leg-b");
    let output = processor.handle(&event).await.unwrap();

    assert!(output.success);
    assert_eq!(switch.commands(), vec![Command::new("uuid_bridge", "leg-a leg-b")]);
}

#[tokio::test]
async fn test_duplicate_event_is_handled_once() {
    let switch = ScriptedSwitch::new();
    let dispatcher = ReflexDispatcher::new(factory(switch.clone()));

    let event = park_event(7)
        .with_header(ACTION_HEADER, "hangup")
        .with_header("variable_callflow_hangup_cause", "NORMAL_CLEARING");

    let first = dispatcher.dispatch(&event).await.unwrap().unwrap();
    let second = dispatcher.dispatch(&event).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(switch.app_names(), vec!["uuid_kill"]);

    // A new occurrence of the same event is a new request
    let next = park_event(8).with_header(ACTION_HEADER, "hangup");
    dispatcher.dispatch(&next).await.unwrap().unwrap();
    assert_eq!(switch.app_names(), vec!["uuid_kill", "uuid_kill"]);
}

#[tokio::test]
async fn test_failed_event_can_be_retried() {
    let switch = ScriptedSwitch::new();
    switch.reply("uuid_bridge", Err(FlowError::Transport("connection reset".to_string())));
    let dispatcher = ReflexDispatcher::new(factory(switch.clone()));

    let event = park_event(3)
        .with_header(ACTION_HEADER, "bridge")
        .with_header("variable_callflow_bridge_to", "leg-b");

    assert!(dispatcher.dispatch(&event).await.unwrap().is_err());
    assert!(dispatcher.dispatch(&event).await.unwrap().unwrap().success);
    assert_eq!(switch.app_names(), vec!["uuid_bridge", "uuid_bridge"]);
}

#[tokio::test]
async fn test_dispatcher_ignores_events_without_action() {
    let switch = ScriptedSwitch::new();
    let dispatcher = ReflexDispatcher::new(factory(switch.clone()));

    assert!(dispatcher.dispatch(&park_event(1)).await.is_none());
    assert!(dispatcher
        .dispatch(&park_event(2).with_header(ACTION_HEADER, " "))
        .await
        .is_none());
    assert!(switch.commands().is_empty());
}

#[tokio::test]
async fn test_dispatcher_reports_unsupported_action() {
    let switch = ScriptedSwitch::new();
    let dispatcher = ReflexDispatcher::new(factory(switch.clone()));

    let result = dispatcher
        .dispatch(&park_event(1).with_header(ACTION_HEADER, "transfer"))
        .await
        .unwrap();

    assert_eq!(result.unwrap_err(), FlowError::UnsupportedAction("transfer".to_string()));
    assert!(switch.commands().is_empty());
}

#[tokio::test]
async fn test_dispatcher_run_consumes_event_stream() {
    let switch = ScriptedSwitch::new();
    let dispatcher = Arc::new(ReflexDispatcher::new(factory(switch.clone())));
    let (tx, rx) = mpsc::channel(8);

    let task = tokio::spawn(dispatcher.run(rx));

    tx.send(park_event(1).with_header(ACTION_HEADER, "hangup")).await.unwrap();
    tx.send(park_event(2)).await.unwrap();
    drop(tx);

    task.await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while switch.commands().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(switch.commands(), vec![Command::new("uuid_kill", "leg-a")]);
}
