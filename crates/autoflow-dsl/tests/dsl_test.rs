//! Flows authored through signature strings, run end to end.

use std::time::Duration;

use autoflow_dsl::{TaskOptions, flow, select_first};
use autoflow_runtime::{EventCollector, Flow, FlowEvent};
use autoflow_task::{InvocationContext, Locals, TaskFn};
use serde_json::{Value, json};
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(5);

fn text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn num(value: &Value) -> i64 {
  value.as_i64().unwrap_or_default()
}

/// Callback task completing after `ms` with `body(args)`.
fn delayed(name: &str, ms: u64, body: fn(&[Value]) -> Value) -> TaskFn {
  TaskFn::callback(move |_, args, done| {
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(ms)).await;
      done.ok([body(&args)]);
    });
    Ok(())
  })
  .named(name)
}

async fn run(flow: &Flow, args: Vec<Value>) -> Vec<Value> {
  timeout(TIMEOUT, flow.invoke(InvocationContext::empty(), args))
    .await
    .expect("flow did not finish in time")
    .expect("flow failed")
}

#[tokio::test]
async fn test_multiply_add_from_signatures() {
  let multiply = TaskFn::callback(|_, args, done| {
    done.ok([json!(num(&args[0]) * num(&args[1]))]);
    Ok(())
  })
  .named("multiply");
  let add = TaskFn::callback(|_, args, done| {
    done.ok([json!(num(&args[0]) + num(&args[1]))]);
    Ok(())
  })
  .named("add");

  let def = flow("multiplyAdd", "a, b, cb -> err, m, s")
    .task(&multiply, "a, b, cb -> err, m")
    .task(&add, "m, a, cb -> err, s")
    .build()
    .unwrap();
  let flow = Flow::build(def).unwrap();

  assert_eq!(flow.name(), "multiplyAdd");
  assert_eq!(run(&flow, vec![json!(2), json!(3)]).await, vec![json!(6), json!(8)]);
}

#[tokio::test]
async fn test_select_first_with_events() {
  // Completes without any result.
  let no_success = TaskFn::callback(|_, _, done| {
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(20)).await;
      done.ok(Vec::new());
    });
    Ok(())
  })
  .named("noSuccess");
  let no_success_null = TaskFn::callback(|_, _, done| {
    done.ok([Value::Null]);
    Ok(())
  })
  .named("noSuccessNull");
  let add = TaskFn::callback(|_, args, done| {
    done.ok([json!(num(&args[0]) + num(&args[1]))]);
    Ok(())
  })
  .named("add");

  let def = select_first("mySelectFirst", "a, b, cb -> err, c")
    .task(&no_success, "a, b, cb -> err, c")
    .task(&no_success_null, "a, b, cb -> err, c")
    .task(&add, "a, b, cb -> err, c")
    .task(&no_success, "a, b, cb -> err, c")
    .build()
    .unwrap();
  let flow = Flow::build(def).unwrap();
  let collector = EventCollector::new();
  collector.capture(&flow, "task.complete");

  assert_eq!(run(&flow, vec![json!(2), json!(3)]).await, vec![json!(5)]);

  let events = collector.list();
  let names: Vec<&str> = events
    .iter()
    .filter_map(FlowEvent::record)
    .map(|record| record.name.as_str())
    .collect();
  assert_eq!(names, vec!["noSuccess", "noSuccessNull", "add"]);
  assert_eq!(events[2].record().unwrap().results, vec![json!(5)]);
}

#[tokio::test]
async fn test_document_pipeline() {
  let load_user = delayed("loadUser", 10, |args| json!(format!("User{}", text(&args[0]))));
  let load_file = delayed("loadFile", 10, |args| json!(format!("Filedata{}", text(&args[0]))));
  let markdown =
    TaskFn::direct(|_, args| Ok(json!(format!("html{}", text(&args[0]))))).named("markdown");
  let prepare_directory = delayed("prepareDirectory", 20, |args| {
    json!(format!("dircreated-{}", text(&args[0])))
  });
  let write_output = delayed("writeOutput", 30, |args| {
    json!(format!("{}_bytesWritten", text(&args[0])))
  });
  let load_email_template = delayed("loadEmailTemplate", 5, |_| json!("emailmd"));
  let customize_email = TaskFn::direct(|_, args| {
    Ok(json!(format!("cust-{}{}", text(&args[0]), text(&args[1]))))
  })
  .named("customizeEmail");
  let deliver_email = delayed("deliverEmail", 10, |args| {
    json!(format!("delivered-{}", text(&args[0])))
  });

  let def = flow("pipeline", "filename, uid, outDirname, cb -> err, html, user, bytesWritten")
    .task(&load_user, "uid -> err, user")
    .task(&load_file, "filename -> err, filedata")
    .task(&markdown, "filedata -> returns html")
    .task(&prepare_directory, "outDirname -> err, dircreated")
    .task_with(
      &write_output,
      "html, user -> err, bytesWritten",
      TaskOptions::new().after(&prepare_directory),
    )
    .task(&load_email_template, "-> err, emailmd")
    .task(&markdown, "emailmd -> returns emailHtml")
    .task(&customize_email, "user, emailHtml -> returns custEmailHtml")
    .task_with(
      &deliver_email,
      "custEmailHtml -> err, deliveredEmail",
      TaskOptions::new().after(&write_output),
    )
    .build()
    .unwrap();
  let flow = Flow::build(def).unwrap();

  let names: Vec<&str> = flow.graph().tasks.iter().map(|t| t.name.as_str()).collect();
  assert_eq!(names[6], "markdown_6");
  assert_eq!(flow.graph().tasks[8].after, vec!["writeOutput"]);

  let runs = [("hello.txt", 100), ("small.txt", 200), ("world.txt", 300)].map(|(file, uid)| {
    let flow = flow.clone();
    async move {
      flow
        .invoke(
          InvocationContext::empty(),
          vec![json!(file), json!(uid), json!(format!("out-{file}"))],
        )
        .await
    }
  });
  let results = timeout(TIMEOUT, futures::future::join_all(runs)).await.unwrap();

  assert_eq!(
    results[0].clone().unwrap(),
    vec![
      json!("htmlFiledatahello.txt"),
      json!("User100"),
      json!("htmlFiledatahello.txt_bytesWritten"),
    ]
  );
  assert_eq!(results[2].clone().unwrap()[1], json!("User300"));
}

#[tokio::test]
async fn test_named_function_with_literal_input() {
  let log = TaskFn::direct(|_, args| {
    assert_eq!(args, vec![json!("using local ref to log")]);
    Ok(Value::Null)
  });
  let foo = TaskFn::callback(|_, _, done| {
    done.ok([json!(100)]);
    Ok(())
  })
  .named("foo");

  let def = flow("refLocal", "cb -> err, result")
    .task("console.log", "\"using local ref to log\" ->")
    .task_with(&foo, "cb -> err, result", TaskOptions::new().after("console.log"))
    .locals(Locals::new().namespace("console", Locals::new().with("log", log)))
    .build()
    .unwrap();
  let flow = Flow::build(def).unwrap();
  let collector = EventCollector::new();
  collector.capture(&flow, "task.complete");

  assert_eq!(run(&flow, vec![]).await, vec![json!(100)]);

  let first = collector.list()[0].record().cloned().unwrap();
  assert_eq!(first.name, "console.log");
  assert!(first.error.is_none());
}
