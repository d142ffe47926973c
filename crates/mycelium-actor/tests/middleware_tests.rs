mod common;

use common::{describe, echo, eventually, Recorder, RecordingActor};
use mycelium_actor::{
    ActorSystem, Context, Message, MessageEnvelope, Pid, Props, ReceiveNext, SendNext,
};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

fn tagging(
    tag: &'static str,
    log: &Recorder,
) -> impl Fn(&mut Context, ReceiveNext<'_>) -> anyhow::Result<()> + Send + Sync + 'static {
    let log = log.clone();
    move |ctx: &mut Context, next: ReceiveNext<'_>| {
        if let Some(message) = ctx.message() {
            log.push(format!("{tag}:{}", describe(message)));
        }
        next.run(ctx)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_receiver_middleware_runs_in_registration_order() {
    let system = ActorSystem::new().unwrap();
    let log = Recorder::default();
    let actor_log = log.clone();
    let props = Props::from_producer(move || RecordingActor {
        log: actor_log.clone(),
    })
    .with_receiver_middleware(tagging("outer", &log))
    .with_receiver_middleware(tagging("inner", &log));

    let pid = system.spawn(&props).unwrap();
    system.send(&pid, "a");

    assert!(eventually(WAIT, || log.contains("a")).await);
    assert_eq!(
        log.entries(),
        [
            "outer:Started",
            "inner:Started",
            "Started",
            "outer:a",
            "inner:a",
            "a"
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_receiver_middleware_can_swallow_messages() {
    let system = ActorSystem::new().unwrap();
    let log = Recorder::default();
    let actor_log = log.clone();
    let props = Props::from_producer(move || RecordingActor {
        log: actor_log.clone(),
    })
    .with_receiver_middleware(|ctx, next| {
        if ctx.message_as::<&str>() == Some(&"secret") {
            return Ok(());
        }
        next.run(ctx)
    });

    let pid = system.spawn(&props).unwrap();
    system.send(&pid, "secret");
    system.send(&pid, "public");

    assert!(eventually(WAIT, || log.contains("public")).await);
    assert_eq!(log.entries(), ["Started", "public"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_receiver_middleware_error_is_supervised() {
    let system = ActorSystem::new().unwrap();
    let log = Recorder::default();
    let actor_log = log.clone();
    let props = Props::from_producer(move || RecordingActor {
        log: actor_log.clone(),
    })
    .with_receiver_middleware(|ctx, next| {
        if ctx.message_as::<&str>() == Some(&"reject") {
            anyhow::bail!("rejected by middleware");
        }
        next.run(ctx)
    });

    let pid = system.spawn(&props).unwrap();
    system.send(&pid, "reject");

    assert!(eventually(WAIT, || log.count("Started") == 2).await);
    assert!(!log.contains("reject"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sender_middleware_wraps_sends_in_order() {
    let system = ActorSystem::new().unwrap();
    let log = Recorder::default();
    let target_log = log.clone();
    let target = system
        .spawn(&Props::from_producer(move || RecordingActor {
            log: target_log.clone(),
        }))
        .unwrap();
    assert!(eventually(WAIT, || log.contains("Started")).await);

    let (first, second) = (log.clone(), log.clone());
    let destination = target.clone();
    let sender = Props::from_fn(move |ctx| {
        if matches!(ctx.message(), Some(Message::Started)) {
            ctx.send(&destination, "hello");
        }
        Ok(())
    })
    .with_sender_middleware(
        move |ctx: &Context, target: &Pid, envelope: MessageEnvelope, next: SendNext<'_>| {
            first.push(format!("first:{}", describe(&envelope.message)));
            next.run(ctx, target, envelope);
        },
    )
    .with_sender_middleware(
        move |ctx: &Context, target: &Pid, envelope: MessageEnvelope, next: SendNext<'_>| {
            second.push(format!("second:{}", describe(&envelope.message)));
            let rewritten = MessageEnvelope {
                message: Message::from_any("rewritten"),
                ..envelope
            };
            next.run(ctx, target, rewritten);
        },
    );
    system.spawn(&sender).unwrap();

    assert!(eventually(WAIT, || log.contains("rewritten")).await);
    assert_eq!(
        log.entries(),
        ["Started", "first:hello", "second:hello", "rewritten"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sender_middleware_sees_responses() {
    let system = ActorSystem::new().unwrap();
    let log = Recorder::default();
    let sent = log.clone();
    let pid = system
        .spawn(&Props::from_fn(echo).with_sender_middleware(
            move |ctx: &Context, target: &Pid, envelope: MessageEnvelope, next: SendNext<'_>| {
                sent.push(describe(&envelope.message));
                next.run(ctx, target, envelope);
            },
        ))
        .unwrap();

    let reply = system
        .request_future(&pid, "ping", WAIT)
        .result_async()
        .await
        .unwrap();

    assert_eq!(reply.downcast_ref::<&str>(), Some(&"ping"));
    assert_eq!(log.entries(), ["ping"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_on_init_runs_before_started_and_once_per_spawn() {
    let system = ActorSystem::new().unwrap();
    let log = Recorder::default();
    let (actor_log, first, second) = (log.clone(), log.clone(), log.clone());
    let props = Props::from_fn(move |ctx| {
        if let Some(message) = ctx.message() {
            actor_log.push(describe(message));
        }
        if ctx.message_as::<&str>() == Some(&"fail") {
            anyhow::bail!("asked to fail");
        }
        Ok(())
    })
    .with_on_init(move |ctx: &mut Context| first.push(format!("init1:{}", ctx.self_pid().id())))
    .with_on_init(move |_: &mut Context| second.push("init2"));

    let pid = system.spawn_named(&props, "initialized").unwrap();
    system.send(&pid, "fail");

    assert!(eventually(WAIT, || log.count("Started") == 2).await);
    assert_eq!(
        log.entries(),
        [
            "init1:initialized",
            "init2",
            "Started",
            "fail",
            "Restarting",
            "Started"
        ]
    );
}
