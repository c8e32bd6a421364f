//! Integration tests for `postMessage` delivery

mod common;

use std::rc::Rc;

use common::{new_log, record_messages, Session};
use skylight::origin::Url;
use skylight::runtime::{CloneCodec, StructuredCloneCodec};
use skylight::window::{event_types, EventListener, WindowPostMessageOptions};
use skylight::{Error, EventLoop, TaskSource, Value, Window, WindowConfig};

fn nested_arrays(depth: usize) -> Value {
    let mut value = Value::from(1.0);
    for _ in 0..depth {
        value = Value::new_array(vec![value]);
    }
    value
}

mod origins {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wildcard_delivers_to_any_origin() {
        let session = Session::new();
        let sender = session.window("https://a.example/");
        let targets = [
            session.window("https://b.example/"),
            session.window("http://a.example:8080/"),
            session.window("data:text/html,hi"),
        ];
        let logs: Vec<_> = targets.iter().map(record_messages).collect();

        for target in &targets {
            target.post_message(&sender, &Value::from(42.0), "*", &[]).unwrap();
        }
        session.run();

        for log in logs {
            let log = log.borrow();
            assert_eq!(log.len(), 1);
            assert_eq!(log[0].event_type, event_types::MESSAGE);
            assert_eq!(log[0].data, Value::from(42.0));
        }
    }

    #[test]
    fn test_mismatched_origin_delivers_nothing() {
        let session = Session::new();
        let sender = session.window("https://a.example/");
        let target = session.window("https://b.example/");
        let log = record_messages(&target);

        target
            .post_message(&sender, &Value::Null, "https://mismatched.example", &[])
            .unwrap();
        assert_eq!(session.run(), 1);
        assert!(log.borrow().is_empty());
        assert!(target.reported_exceptions().is_empty());
    }

    #[test]
    fn test_matching_origin_ignores_path() {
        let session = Session::new();
        let sender = session.window("https://a.example/");
        let target = session.window("https://b.example/inbox");
        let log = record_messages(&target);

        target
            .post_message(&sender, &Value::Null, "https://b.example/anything?q#f", &[])
            .unwrap();
        session.run();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_slash_targets_sender_origin() {
        let session = Session::new();
        let sender = session.window("https://a.example/");
        let same = session.window("https://a.example/frame");
        let other = session.window("https://b.example/");
        let same_log = record_messages(&same);
        let other_log = record_messages(&other);

        same.post_message(&sender, &Value::Null, "/", &[]).unwrap();
        other.post_message(&sender, &Value::Null, "/", &[]).unwrap();
        session.run();

        assert_eq!(same_log.borrow().len(), 1);
        assert!(other_log.borrow().is_empty());
    }

    #[test]
    fn test_event_carries_sender_origin_and_source() {
        let session = Session::new();
        let sender = session.window("https://a.example:444/page");
        let target = session.window("https://b.example/");
        let log = record_messages(&target);

        target.post_message(&sender, &Value::from("x"), "*", &[]).unwrap();
        session.run();

        let log = log.borrow();
        assert_eq!(log[0].origin, "https://a.example:444");
        assert!(Rc::ptr_eq(log[0].source.as_ref().unwrap(), &sender));
    }

    #[test]
    fn test_opaque_sender_origin_serializes_as_null() {
        let session = Session::new();
        let sender = session.window("https://a.example/");
        let target = session.window("https://b.example/");
        let log = record_messages(&target);

        let sandboxed = sender.open("", "_blank", "noopener").unwrap();
        assert!(sandboxed.is_none());
        let sandboxed = skylight::Navigable::active_window(
            &*session.registry.navigables().pop().unwrap(),
        )
        .unwrap();

        target.post_message(&sandboxed, &Value::Null, "*", &[]).unwrap();
        session.run();
        assert_eq!(log.borrow()[0].origin, "null");
    }
}

mod ordering {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sequential_messages_arrive_in_order() {
        let session = Session::new();
        let sender = session.window("https://a.example/");
        let target = session.window("https://b.example/");
        let log = record_messages(&target);

        for i in 0..5 {
            target
                .post_message(&sender, &Value::from(i as f64), "*", &[])
                .unwrap();
        }
        session.run();

        let received: Vec<Value> = log.borrow().iter().map(|e| e.data.clone()).collect();
        let expected: Vec<Value> = (0..5).map(|i| Value::from(i as f64)).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn test_fifo_across_targets_and_sources() {
        let session = Session::new();
        let a = session.window("https://a.example/");
        let b = session.window("https://b.example/");
        let order = new_log();

        for (window, name) in [(&a, "a"), (&b, "b")] {
            let order = order.clone();
            window.add_event_listener(
                event_types::MESSAGE,
                EventListener::new(move |event| {
                    order.borrow_mut().push(format!("{}:{}", name, event.data));
                    Ok(())
                }),
            );
        }

        b.post_message(&a, &Value::from("1"), "*", &[]).unwrap();
        a.post_message(&b, &Value::from("2"), "*", &[]).unwrap();
        b.post_message(&a, &Value::from("3"), "*", &[]).unwrap();
        session.run();

        assert_eq!(*order.borrow(), vec!["b:1", "a:2", "b:3"]);
    }

    #[test]
    fn test_message_posted_from_listener_is_delivered_later() {
        let session = Session::new();
        let a = session.window("https://a.example/");
        let b = session.window("https://b.example/");
        let log = record_messages(&a);

        let reply_to = Rc::downgrade(&a);
        let me = Rc::downgrade(&b);
        b.add_event_listener(
            event_types::MESSAGE,
            EventListener::new(move |event| {
                if let (Some(a), Some(b)) = (reply_to.upgrade(), me.upgrade()) {
                    a.post_message(&b, &event.data, "*", &[])?;
                }
                Ok(())
            }),
        );

        b.post_message(&a, &Value::from("ping"), "*", &[]).unwrap();
        assert_eq!(session.run(), 2);
        assert_eq!(log.borrow()[0].data, Value::from("ping"));
        assert_eq!(
            session.event_loop.stats().tasks_run_by_source[&TaskSource::PostedMessage],
            2
        );
    }
}

mod payloads {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_object_graph_is_cloned() {
        let session = Session::new();
        let sender = session.window("https://a.example/");
        let target = session.window("https://b.example/");
        let log = record_messages(&target);

        let object = Value::new_object();
        object.set_property("self", object.clone());
        object.set_property("when", Value::new_date(1_000.0));

        target.post_message(&sender, &object, "*", &[]).unwrap();
        session.run();

        let data = log.borrow()[0].data.clone();
        assert_ne!(data.object_identity(), object.object_identity());
        let inner = data.get_property("self").unwrap();
        assert_eq!(inner.object_identity(), data.object_identity());
    }

    #[test]
    fn test_mutation_after_post_is_not_observed() {
        let session = Session::new();
        let sender = session.window("https://a.example/");
        let target = session.window("https://b.example/");
        let log = record_messages(&target);

        let object = Value::new_object();
        object.set_property("n", Value::from(1.0));
        target.post_message(&sender, &object, "*", &[]).unwrap();
        object.set_property("n", Value::from(2.0));
        session.run();

        assert_eq!(
            log.borrow()[0].data.get_property("n"),
            Some(Value::from(1.0))
        );
    }

    #[test]
    fn test_transfer_moves_buffers_and_ports() {
        let session = Session::new();
        let sender = session.window("https://a.example/");
        let target = session.window("https://b.example/");
        let log = record_messages(&target);

        let buffer = Value::new_array_buffer(vec![1, 2, 3]);
        let port = Value::new_message_port();
        let port_id = port.message_port_id();

        target
            .post_message_with_options(
                &sender,
                &buffer,
                &WindowPostMessageOptions {
                    target_origin: "*".to_string(),
                    transfer: vec![buffer.clone(), port.clone()],
                },
            )
            .unwrap();
        assert!(buffer.is_detached());
        assert!(port.is_detached());
        session.run();

        let log = log.borrow();
        assert_eq!(log[0].data.array_buffer_bytes(), Some(vec![1, 2, 3]));
        assert_eq!(log[0].ports.len(), 1);
        assert_eq!(log[0].ports[0].message_port_id(), port_id);
    }

    #[test]
    fn test_unserializable_payload_fails_synchronously() {
        let session = Session::new();
        let sender = session.window("https://a.example/");
        let target = session.window("https://b.example/");
        let buffer = Value::new_array_buffer(vec![9]);

        let payload = Value::new_array(vec![buffer.clone(), Value::new_function(None)]);
        let err = target
            .post_message(&sender, &payload, "*", &[buffer.clone()])
            .unwrap_err();

        assert!(err.is_syntax_error());
        assert!(matches!(err, Error::SyntaxError { cause: Some(_), .. }));
        assert!(!buffer.is_detached());
        assert!(!session.event_loop.has_pending_tasks());
    }

    #[test]
    fn test_duplicate_transfer_fails_synchronously() {
        let session = Session::new();
        let sender = session.window("https://a.example/");
        let target = session.window("https://b.example/");
        let port = Value::new_message_port();

        let err = target
            .post_message(&sender, &Value::Null, "*", &[port.clone(), port.clone()])
            .unwrap_err();
        assert!(err.is_syntax_error());
        assert!(!session.event_loop.has_pending_tasks());
    }

    #[test]
    fn test_serialized_record_exports_json() {
        let codec = StructuredCloneCodec::default();
        let record = codec
            .serialize_with_transfer(&Value::new_array(vec![Value::from("a")]), &[])
            .unwrap();
        let json = record.to_json().unwrap();
        assert!(json.contains("\"a\""));
    }
}

mod failures {
    use super::*;
    use pretty_assertions::assert_eq;

    fn window_with_depth(event_loop: &Rc<EventLoop>, url: &str, depth: usize) -> Rc<Window> {
        Window::builder(event_loop.clone())
            .config(WindowConfig {
                clone_max_depth: depth,
                ..WindowConfig::default()
            })
            .url(Url::parse(url).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_deserialization_failure_fires_messageerror() {
        let event_loop = Rc::new(EventLoop::new());
        let sender = window_with_depth(&event_loop, "https://a.example/", 1000);
        let target = window_with_depth(&event_loop, "https://b.example/", 2);
        let log = record_messages(&target);

        target
            .post_message(&sender, &nested_arrays(10), "*", &[])
            .unwrap();
        event_loop.run_until_idle();

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].event_type, event_types::MESSAGE_ERROR);
        assert!(log[0].is_error());
        assert_eq!(log[0].origin, "https://a.example");
        assert!(Rc::ptr_eq(log[0].source.as_ref().unwrap(), &sender));
        assert!(log[0].data.is_undefined());
    }

    #[test]
    fn test_deserialization_failure_after_origin_mismatch_is_silent() {
        let event_loop = Rc::new(EventLoop::new());
        let sender = window_with_depth(&event_loop, "https://a.example/", 1000);
        let target = window_with_depth(&event_loop, "https://b.example/", 2);
        let log = record_messages(&target);

        target
            .post_message(&sender, &nested_arrays(10), "https://c.example", &[])
            .unwrap();
        event_loop.run_until_idle();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_listener_error_does_not_stop_delivery() {
        let session = Session::new();
        let sender = session.window("https://a.example/");
        let target = session.window("https://b.example/");
        target.add_event_listener(
            event_types::MESSAGE,
            EventListener::new(|_| Err(Error::type_error("handler blew up"))),
        );
        let log = record_messages(&target);

        target.post_message(&sender, &Value::from(1.0), "*", &[]).unwrap();
        target.post_message(&sender, &Value::from(2.0), "*", &[]).unwrap();
        session.run();

        assert_eq!(log.borrow().len(), 2);
        assert_eq!(
            target.reported_exceptions(),
            vec![
                "TypeError: handler blew up".to_string(),
                "TypeError: handler blew up".to_string()
            ]
        );
    }
}
