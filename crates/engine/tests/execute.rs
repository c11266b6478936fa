use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value as Json, json};
use ttml_engine::{CallbackError, ExecError, Executor, ExecutorOptions, Host, PromptOption};
use ttml_types::{
    Arg, Assignment, ChoiceArg, ChoiceOption, Comparison, Conditional, InterpolatedText, MessageText, Op, OptionKey,
    Primitive, Program, RawEntry, RollArg, RollResult, SayArg, Step, TargetArg, TemplateArg, Token, TokenRef, Value, ValueMap,
};

/// Host with scripted answers. Rolls return queued values, then 12.
#[derive(Default)]
struct ScriptedHost {
    rolls: Mutex<VecDeque<i64>>,
    commands: Mutex<Vec<String>>,
    prompts: Mutex<Vec<(String, Vec<PromptOption>)>>,
    prompt_answer: Option<Result<String, ()>>,
    input_answer: Option<String>,
    target_answer: Option<String>,
    library: HashMap<String, Program>,
    stall: bool,
}

impl ScriptedHost {
    fn with_rolls(values: &[i64]) -> Self {
        Self {
            rolls: Mutex::new(values.iter().copied().collect()),
            ..Self::default()
        }
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("commands lock").clone()
    }

    fn prompt_count(&self) -> usize {
        self.prompts.lock().expect("prompts lock").len()
    }
}

#[async_trait]
impl Host for ScriptedHost {
    async fn roll(&self, command: &str) -> anyhow::Result<RollResult> {
        if self.stall {
            std::future::pending::<()>().await;
        }
        self.commands.lock().expect("commands lock").push(command.to_string());
        let value = self.rolls.lock().expect("rolls lock").pop_front().unwrap_or(12);
        Ok(RollResult::new(Value::Number(value), json!({ "value": value })))
    }

    fn parse(&self, source: &str) -> Result<Program, CallbackError> {
        let name = source
            .strip_prefix('#')
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or_default();
        self.library
            .get(name)
            .cloned()
            .ok_or_else(|| CallbackError::Failed(anyhow::anyhow!("unknown macro {name}")))
    }

    async fn prompt(&self, message: &str, options: &[PromptOption]) -> Result<String, CallbackError> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push((message.to_string(), options.to_vec()));
        match &self.prompt_answer {
            Some(Ok(answer)) => Ok(answer.clone()),
            Some(Err(())) => Err(CallbackError::Cancelled),
            None => Err(CallbackError::NotProvided),
        }
    }

    async fn input(&self, _message: &str) -> Result<String, CallbackError> {
        self.input_answer.clone().ok_or(CallbackError::NotProvided)
    }

    async fn target(&self, _message: &str) -> Result<String, CallbackError> {
        self.target_answer.clone().ok_or(CallbackError::NotProvided)
    }

    async fn function(&self, name: &str, args: Vec<Json>) -> Result<Json, CallbackError> {
        match name {
            "get" => Ok(json!({ "id": "foo", "content": "bar", "args": args })),
            _ => Err(CallbackError::NotProvided),
        }
    }
}

fn say(text: &str) -> Step {
    Step::new(Op::Say, vec![Arg::Say(SayArg::Message(MessageText::from(text)))])
}

fn roll(n: i64, d: i64) -> Vec<Arg> {
    vec![Arg::Roll(RollArg::N(Value::Number(n))), Arg::Roll(RollArg::D(Value::Number(d)))]
}

fn assign(kind: fn(Assignment) -> Arg, left: Value, right: Vec<Value>) -> Step {
    Step::new(Op::Lambda, vec![kind(Assignment { left, right })])
}

fn variable(name: &str) -> Value {
    Value::Variable(name.to_string())
}

fn attributes(value: Json) -> Map<String, Json> {
    match value {
        Json::Object(map) => map,
        _ => Map::new(),
    }
}

fn messages(output: &ttml_types::Output) -> Vec<&str> {
    output.messages.iter().map(|message| message.message.as_str()).collect()
}

#[tokio::test]
async fn exit_stops_the_remaining_steps() {
    let mut executor = Executor::new(ScriptedHost::default());
    let output = executor
        .execute(&[say("before"), Step::exit(), say("after")], true)
        .await
        .expect("execute");
    assert_eq!(messages(&output), vec!["before"]);
}

#[tokio::test]
async fn exit_inside_an_inline_macro_returns_to_the_caller() {
    let mut host = ScriptedHost::default();
    host.library.insert(
        "attack".into(),
        Program {
            name: "attack".into(),
            steps: vec![say("swing"), Step::exit(), say("never")],
        },
    );
    let mut executor = Executor::new(host);
    executor.state_mut().set_token(
        "me",
        &attributes(json!({ "name": "Ayla" })),
        &attributes(json!({ "attack": "!say swing" })),
    );

    let program = vec![
        Step::new(Op::Lambda, vec![Arg::Token(TokenRef::macro_call("me", "attack"))]),
        say("done"),
    ];
    let output = executor.execute(&program, false).await.expect("execute");

    assert_eq!(messages(&output), vec!["swing", "done"]);
    assert_eq!(output.messages[0].from.as_deref(), Some("me"));
    assert_eq!(executor.state().run_as(), Some("me"));
}

#[tokio::test]
async fn missing_macro_is_reported() {
    let mut executor = Executor::new(ScriptedHost::default());
    executor.state_mut().set_token("me", &Map::new(), &Map::new());
    let error = executor
        .execute(&[Step::new(Op::Lambda, vec![Arg::Token(TokenRef::macro_call("me", "heal"))])], true)
        .await
        .expect_err("macro is missing");
    assert_eq!(error.to_string(), "Token macro @me->heal not found");
}

#[tokio::test]
async fn conditional_runs_the_matching_branch() {
    let conditional = |left: i64| {
        Step::new(
            Op::Lambda,
            vec![Arg::Conditional(Conditional {
                comparison: Comparison::GreaterThan,
                left: Value::Number(left),
                right: Value::Number(10),
                success: Some(Box::new(say("hit"))),
                failure: Some(Box::new(say("miss"))),
            })],
        )
    };
    let mut executor = Executor::new(ScriptedHost::default());
    let output = executor
        .execute(&[conditional(15), conditional(3)], true)
        .await
        .expect("execute");
    assert_eq!(messages(&output), vec!["hit", "miss"]);
}

#[tokio::test]
async fn exit_as_a_branch_does_not_stop_the_program() {
    let step = Step::new(
        Op::Lambda,
        vec![Arg::Conditional(Conditional {
            comparison: Comparison::EqualTo,
            left: Value::Number(1),
            right: Value::Number(1),
            success: Some(Box::new(Step::exit())),
            failure: None,
        })],
    );
    let mut executor = Executor::new(ScriptedHost::default());
    let output = executor.execute(&[step, say("still here")], true).await.expect("execute");
    assert_eq!(messages(&output), vec!["still here"]);
}

#[tokio::test]
async fn saved_rolls_feed_later_commands() {
    let mut executor = Executor::new(ScriptedHost::with_rolls(&[12, 7]));
    let mut modified = roll(1, 8);
    modified.push(Arg::Roll(RollArg::ModifierPos(Value::VariableReserved(1))));
    let program = vec![Step::new(Op::Roll, roll(1, 20)).saved(), Step::new(Op::Roll, modified)];

    let output = executor.execute(&program, true).await.expect("execute");

    assert_eq!(executor.host().commands(), vec!["1d20", "1d8+12"]);
    assert_eq!(output.rolls.len(), 2);
    assert_eq!(output.rolls[1].value, Value::Number(7));
}

#[tokio::test]
async fn hidden_rolls_stay_out_of_the_display_log() {
    let mut executor = Executor::new(ScriptedHost::default());
    let output = executor
        .execute(&[Step::new(Op::RollHidden, roll(1, 20)).saved()], false)
        .await
        .expect("execute");

    assert_eq!(output.rolls.len(), 1);
    assert!(output.rolls[0].is_hidden);
    assert!(output.raw.is_empty());
    assert_eq!(executor.state().variable(1), Some(&Value::Number(12)));
}

#[tokio::test]
async fn whispered_rolls_and_messages_carry_recipients() {
    let mut executor = Executor::new(ScriptedHost::default());
    executor.state_mut().set_token("gm", &Map::new(), &Map::new());
    let mut whisper_roll = roll(1, 20);
    whisper_roll.push(Arg::Token(TokenRef::new("gm")));
    let program = vec![
        Step::new(Op::RollWhisper, whisper_roll),
        Step::new(
            Op::Whisper,
            vec![
                Arg::Say(SayArg::Message(MessageText::from("psst"))),
                Arg::Say(SayArg::To(TokenRef::new("gm"))),
            ],
        ),
        Step::new(
            Op::Say,
            vec![
                Arg::Say(SayArg::Message(MessageText::from("hello"))),
                Arg::Say(SayArg::To(TokenRef::new("gm"))),
            ],
        ),
    ];

    let output = executor.execute(&program, true).await.expect("execute");

    assert_eq!(output.rolls[0].to.as_deref(), Some("gm"));
    assert_eq!(output.messages[0].to.as_deref(), Some("gm"));
    assert_eq!(output.messages[1].to, None);
    assert!(matches!(output.raw.first(), Some(RawEntry::Roll(_))));
}

#[tokio::test]
async fn assignment_folds_arithmetic_over_results_and_variables() {
    let mut executor = Executor::new(ScriptedHost::default());
    executor.state_mut().set_result("hp", Value::Number(42));
    executor.state_mut().push_variable(Value::Number(3));
    executor.state_mut().push_variable(Value::Number(12));

    let program = vec![assign(
        Arg::Assign,
        variable("hp"),
        vec![variable("hp"), Value::Primitive(Primitive::Subtract), Value::VariableReserved(2)],
    )];
    executor.execute(&program, false).await.expect("execute");

    assert_eq!(executor.state().result("hp"), Some(&Value::Number(30)));
}

#[tokio::test]
async fn inexact_division_produces_a_float() {
    let mut executor = Executor::new(ScriptedHost::default());
    let program = vec![assign(
        Arg::Assign,
        variable("half"),
        vec![Value::Number(73), Value::Primitive(Primitive::Divide), Value::Number(2)],
    )];
    executor.execute(&program, false).await.expect("execute");
    assert_eq!(executor.state().result("half"), Some(&Value::Float(36.5)));
}

#[tokio::test]
async fn concat_and_deduct_update_text_and_numbers() {
    let mut executor = Executor::new(ScriptedHost::default());
    let program = vec![
        assign(Arg::Assign, variable("greeting"), vec![Value::text("hello")]),
        assign(Arg::Concat, variable("greeting"), vec![Value::text(" world")]),
        assign(Arg::Deduct, variable("greeting"), vec![Value::text("world")]),
        assign(Arg::Assign, variable("hp"), vec![Value::Number(10)]),
        assign(Arg::Concat, variable("hp"), vec![Value::Number(5)]),
        assign(Arg::Deduct, variable("hp"), vec![Value::Number(3)]),
    ];
    executor.execute(&program, false).await.expect("execute");

    assert_eq!(executor.state().result("greeting"), Some(&Value::text("hello ")));
    assert_eq!(executor.state().result("hp"), Some(&Value::Number(12)));
}

#[tokio::test]
async fn concat_appends_to_token_collections() {
    let mut executor = Executor::new(ScriptedHost::default());
    executor
        .state_mut()
        .set_token("me", &attributes(json!({ "attacks": ["sword"] })), &Map::new());
    let program = vec![assign(
        Arg::Concat,
        Value::Token(TokenRef::attribute("me", "attacks")),
        vec![Value::text("bow")],
    )];
    executor.execute(&program, true).await.expect("execute");

    let token = executor.state().token("me").expect("token");
    assert_eq!(
        token.attributes.get("attacks"),
        Some(&Value::Array(vec![Value::text("sword"), Value::text("bow")]))
    );
}

#[tokio::test]
async fn consecutive_concats_extend_object_collections() {
    let mut executor = Executor::new(ScriptedHost::default());
    executor
        .state_mut()
        .set_token("me", &attributes(json!({ "attacks": { "0": { "name": "Melee" } } })), &Map::new());
    let attacks = Value::Token(TokenRef::attribute("me", "attacks"));
    let program = vec![Step::new(
        Op::Lambda,
        vec![
            Arg::Concat(Assignment {
                left: attacks.clone(),
                right: vec![Value::text("Ranged")],
            }),
            Arg::Concat(Assignment {
                left: attacks,
                right: vec![Value::text("Thrown")],
            }),
        ],
    )];
    executor.execute(&program, true).await.expect("execute");

    let token = executor.state().token("me").expect("token");
    let Some(Value::Object(attacks)) = token.attributes.get("attacks") else {
        panic!("attacks should stay an object");
    };
    assert_eq!(attacks.keys().map(String::as_str).collect::<Vec<_>>(), vec!["0", "1", "2"]);
    assert_eq!(attacks.get("1"), Some(&Value::text("Ranged")));
    assert_eq!(attacks.get("2"), Some(&Value::text("Thrown")));
}

#[tokio::test]
async fn concat_keeps_references_stored_in_collections() {
    let mut executor = Executor::new(ScriptedHost::default());
    let name_ref = Value::Token(TokenRef::attribute("me", "name"));
    let mut stored = ValueMap::new();
    stored.insert("name".into(), Value::text("Tester"));
    stored.insert("titles".into(), Value::Array(vec![name_ref.clone()]));
    executor.state_mut().set_raw_token(
        "me",
        Token {
            attributes: stored,
            macros: ValueMap::new(),
        },
    );
    let program = vec![assign(
        Arg::Concat,
        Value::Token(TokenRef::attribute("me", "titles")),
        vec![Value::text("the Brave")],
    )];
    executor.execute(&program, true).await.expect("execute");

    let token = executor.state().token("me").expect("token");
    assert_eq!(
        token.attributes.get("titles"),
        Some(&Value::Array(vec![name_ref, Value::text("the Brave")]))
    );
}

#[tokio::test]
async fn deep_attribute_writes_create_containers() {
    let mut executor = Executor::new(ScriptedHost::default());
    executor.state_mut().set_token("me", &Map::new(), &Map::new());
    let program = vec![assign(
        Arg::Assign,
        Value::Token(TokenRef::attribute("me", "rar.0.bar")),
        vec![Value::text("baz")],
    )];
    executor.execute(&program, true).await.expect("execute");

    let token = executor.state().token("me").expect("token");
    let mut inner = ttml_types::ValueMap::new();
    inner.insert("bar".into(), Value::text("baz"));
    assert_eq!(token.attributes.get("rar"), Some(&Value::Array(vec![Value::Object(inner)])));
}

#[tokio::test]
async fn embedded_steps_supply_assignment_operands() {
    let mut executor = Executor::new(ScriptedHost::with_rolls(&[9]));
    let program = vec![
        assign(
            Arg::Assign,
            variable("damage"),
            vec![
                Value::Step(Box::new(Step::new(Op::Roll, roll(2, 6)))),
                Value::Primitive(Primitive::Add),
                Value::Number(3),
            ],
        ),
        assign(
            Arg::Assign,
            variable("fetched"),
            vec![Value::Step(Box::new(Step::new(
                Op::Function("get".into()),
                vec![Arg::Function(Value::text("foo"))],
            )))],
        ),
    ];
    let output = executor.execute(&program, false).await.expect("execute");

    assert_eq!(executor.state().result("damage"), Some(&Value::Number(12)));
    assert_eq!(output.rolls.len(), 1);
    let Some(Value::Object(fetched)) = executor.state().result("fetched") else {
        panic!("function result should be an object");
    };
    assert_eq!(fetched.get("content"), Some(&Value::text("bar")));
    assert_eq!(fetched.get("args"), Some(&Value::Array(vec![Value::text("foo")])));
}

#[tokio::test]
async fn prompt_stores_the_selected_key() {
    let host = ScriptedHost {
        prompt_answer: Some(Ok("0".into())),
        ..ScriptedHost::default()
    };
    let mut executor = Executor::new(host);
    executor
        .state_mut()
        .set_token("me", &attributes(json!({ "dexterity_mod": 3 })), &Map::new());
    let step = Step::new(
        Op::Prompt,
        vec![Arg::Prompt(ChoiceArg {
            message: Some(MessageText::from("Pick one")),
            options: vec![
                ChoiceOption {
                    key: OptionKey::Text("1".into()),
                    value: Value::Number(10),
                },
                ChoiceOption {
                    key: OptionKey::Text("asd".into()),
                    value: Value::Token(TokenRef::attribute("me", "dexterity_mod")),
                },
            ],
            input: None,
        })],
    );
    executor.execute(&[step], false).await.expect("execute");

    assert_eq!(executor.state().last_variable(), Some(&Value::text("1")));
    let prompts = executor.host().prompts.lock().expect("prompts lock").clone();
    assert_eq!(prompts[0].0, "Pick one");
    assert_eq!(prompts[0].1[1].value, "@me.dexterity_mod");
}

#[tokio::test]
async fn case_with_a_matching_selector_skips_the_prompt() {
    let mut executor = Executor::new(ScriptedHost::default());
    let step = Step::new(
        Op::Case,
        vec![Arg::Case(ChoiceArg {
            message: None,
            options: vec![
                ChoiceOption {
                    key: OptionKey::Text("foo".into()),
                    value: Value::Number(10),
                },
                ChoiceOption {
                    key: OptionKey::Text("bar".into()),
                    value: Value::Number(11),
                },
            ],
            input: Some(Value::text("bar")),
        })],
    );
    executor.execute(&[step], false).await.expect("execute");

    assert_eq!(executor.state().last_variable(), Some(&Value::Number(11)));
    assert_eq!(executor.host().prompt_count(), 0);
}

#[tokio::test]
async fn prompt_without_options_is_skipped() {
    let mut executor = Executor::new(ScriptedHost::default());
    let step = Step::new(Op::Prompt, vec![Arg::Prompt(ChoiceArg::default())]);
    executor.execute(&[step], false).await.expect("execute");
    assert!(executor.state().variables().is_empty());
    assert_eq!(executor.host().prompt_count(), 0);
}

#[tokio::test]
async fn interactive_steps_need_their_callbacks() {
    let choice = Step::new(
        Op::Prompt,
        vec![Arg::Prompt(ChoiceArg {
            message: None,
            options: vec![ChoiceOption {
                key: OptionKey::Number(1),
                value: Value::Number(1),
            }],
            input: None,
        })],
    );

    let mut executor = Executor::new(ScriptedHost::default());
    let prompt = executor.execute(&[choice.clone()], true).await;
    assert!(matches!(prompt, Err(ExecError::NoPromptHandler)));
    let input = executor.execute(&[Step::new(Op::Input, vec![])], true).await;
    assert!(matches!(input, Err(ExecError::NoInputHandler)));
    let target = executor.execute(&[Step::new(Op::Target, vec![])], true).await;
    assert!(matches!(target, Err(ExecError::NoTargetHandler)));

    let cancelling = ScriptedHost {
        prompt_answer: Some(Err(())),
        ..ScriptedHost::default()
    };
    let mut executor = Executor::new(cancelling);
    let cancelled = executor.execute(&[choice], true).await;
    assert!(matches!(cancelled, Err(ExecError::HostCallbackCancelled { .. })));
}

#[tokio::test]
async fn input_answers_become_positional_variables() {
    let host = ScriptedHost {
        input_answer: Some("42".into()),
        ..ScriptedHost::default()
    };
    let mut executor = Executor::new(host);
    let step = Step::new(Op::Input, vec![Arg::Input(InterpolatedText::new(vec![Value::text("How many?")]))]);
    executor.execute(&[step], false).await.expect("execute");
    assert_eq!(executor.state().variable(0), Some(&Value::text("42")));
}

#[tokio::test]
async fn target_is_required_before_it_is_referenced() {
    let mut executor = Executor::new(ScriptedHost::default());
    let reference = Step::new(
        Op::Say,
        vec![Arg::Say(SayArg::Message(MessageText::Interpolated(InterpolatedText::new(vec![
            Value::text("Hitting "),
            Value::Token(TokenRef::attribute("target", "name")),
        ]))))],
    );
    let error = executor
        .execute(&[reference.clone()], true)
        .await
        .expect_err("no target selected");
    assert!(matches!(error, ExecError::NoTargetSelected));

    let host = ScriptedHost {
        target_answer: Some("goblin".into()),
        ..ScriptedHost::default()
    };
    let mut executor = Executor::new(host);
    executor
        .state_mut()
        .set_token("goblin", &attributes(json!({ "name": "Goblin" })), &Map::new());
    let target = Step::new(Op::Target, vec![Arg::Target(TargetArg::Message(MessageText::from("Who?")))]);
    let output = executor.execute(&[target, reference], true).await.expect("execute");

    assert_eq!(messages(&output), vec!["Hitting Goblin"]);
    assert_eq!(executor.state().target(), None);
}

#[tokio::test]
async fn templates_are_emitted_with_decoded_attributes() {
    let mut executor = Executor::new(ScriptedHost::default());
    executor.state_mut().set_result("damage", Value::Number(8));
    let mut attributes = ttml_types::ValueMap::new();
    attributes.insert("title".into(), Value::text("Fireball"));
    attributes.insert("damage".into(), variable("damage"));
    let step = Step::new(
        Op::Template,
        vec![
            Arg::Template(TemplateArg::Name(MessageText::from("spell"))),
            Arg::Template(TemplateArg::Attributes(Value::Object(attributes))),
        ],
    );
    let output = executor.execute(&[step], true).await.expect("execute");

    assert_eq!(output.templates[0].name, "spell");
    assert_eq!(Json::Object(output.templates[0].attributes.clone()), json!({ "title": "Fireball", "damage": 8 }));
    assert!(matches!(output.raw.first(), Some(RawEntry::Template(_))));
}

#[tokio::test]
async fn test_mode_marks_rolls_and_messages() {
    let mut executor = Executor::new(ScriptedHost::default());
    let program = vec![
        Step::new(Op::TestMode, vec![Arg::TestMode(Some(true))]),
        Step::new(Op::Roll, roll(1, 20)),
        say("practice"),
    ];
    let output = executor.execute(&program, true).await.expect("execute");

    assert!(output.rolls[0].is_test);
    assert!(output.messages[0].is_test);
    assert!(executor.state().test_mode());
}

#[tokio::test]
async fn cleanup_clears_the_session() {
    let mut executor = Executor::new(ScriptedHost::default());
    let program = vec![
        assign(Arg::Assign, variable("foo"), vec![Value::Number(1)]),
        Step::new(Op::Roll, roll(1, 20)).saved(),
    ];

    executor.execute(&program, false).await.expect("execute");
    assert_eq!(executor.state().result("foo"), Some(&Value::Number(1)));
    assert_eq!(executor.state().variables().len(), 1);

    executor.execute(&program, true).await.expect("execute");
    assert!(executor.state().results().is_empty());
    assert!(executor.state().variables().is_empty());
}

#[tokio::test]
async fn failures_keep_mutations_made_before_the_error() {
    let mut executor = Executor::new(ScriptedHost::default());
    let program = vec![
        assign(Arg::Assign, variable("foo"), vec![Value::Number(1)]),
        assign(Arg::Assign, variable("bar"), vec![variable("missing")]),
    ];
    let error = executor.execute(&program, true).await.expect_err("missing variable");

    assert_eq!(error.to_string(), "Variable $missing is not set and can not be used");
    assert_eq!(executor.state().result("foo"), Some(&Value::Number(1)));
}

#[tokio::test]
async fn slow_callbacks_time_out() {
    let host = ScriptedHost {
        stall: true,
        ..ScriptedHost::default()
    };
    let mut executor = Executor::new(host).with_options(ExecutorOptions {
        callback_timeout: Some(Duration::from_millis(20)),
    });
    let error = executor
        .execute(&[Step::new(Op::Roll, roll(1, 20))], true)
        .await
        .expect_err("roll stalls");
    assert!(matches!(error, ExecError::CallbackTimedOut { .. }));
}
