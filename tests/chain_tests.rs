mod common;

use agentcore::agent::{AgentChain, AgentGroup, UserInputAgent};
use agentcore::error::AgentCoreError;
use agentcore::handoff::HandoffKind;
use agentcore::node::{Node, NodeCheckpoint, NodeStatus, RunOutcome, Variables};
use agentcore::termination::StopMessageTermination;
use common::{scripted_agent, ScriptedClient};

fn review_chain(editor: std::sync::Arc<ScriptedClient>) -> anyhow::Result<AgentChain> {
    Ok(AgentChain::builder("review")
        .agent(Box::new(scripted_agent(
            "writer",
            ScriptedClient::texts(["first draft"]),
        )))
        .agent(Box::new(UserInputAgent::new("ask")))
        .agent(Box::new(scripted_agent("editor", editor)))
        .build()?)
}

#[tokio::test]
async fn outputs_feed_the_next_member() -> anyhow::Result<()> {
    let second = ScriptedClient::texts(["polished"]);
    let mut chain = AgentChain::builder("pipeline")
        .agent(Box::new(scripted_agent("writer", ScriptedClient::texts(["rough"]))))
        .agent(Box::new(scripted_agent("editor", second.clone())))
        .build()?;

    let outcome = chain.run("topic", &mut Variables::new()).await?;
    assert_eq!(outcome, RunOutcome::Completed { output: "polished".into() });
    assert_eq!(second.requests()[0].user, "rough");
    assert_eq!(chain.round(), 2);
    assert_eq!(chain.status(), NodeStatus::Done);
    assert_eq!(chain.conversation_text(), "writer: rough\neditor: polished");
    Ok(())
}

#[tokio::test]
async fn termination_ends_the_chain_early() -> anyhow::Result<()> {
    let editor = ScriptedClient::texts(["unused"]);
    let mut chain = AgentChain::builder("pipeline")
        .agent(Box::new(scripted_agent(
            "writer",
            ScriptedClient::texts(["TERMINATE nothing to write"]),
        )))
        .agent(Box::new(scripted_agent("editor", editor.clone())))
        .termination(Box::new(StopMessageTermination))
        .build()?;

    let outcome = chain.run("topic", &mut Variables::new()).await?;
    assert_eq!(outcome.output(), "TERMINATE nothing to write");
    assert!(editor.requests().is_empty());
    assert_eq!(chain.status(), NodeStatus::Done);
    Ok(())
}

#[tokio::test]
async fn waiting_member_suspends_and_resumes_from_checkpoint() -> anyhow::Result<()> {
    let mut chain = review_chain(ScriptedClient::texts(["unused"]))?;
    let mut vars = Variables::new();

    let outcome = chain.run("write about rust", &mut vars).await?;
    assert!(outcome.is_suspended());
    assert_eq!(outcome.output(), "first draft");
    assert_eq!(chain.status(), NodeStatus::WaitingForUserInput);
    assert_eq!(chain.cursor(), 1);

    let saved = serde_json::to_string(&chain.checkpoint()?)?;
    let editor = ScriptedClient::texts(["final cut"]);
    let mut restored = review_chain(editor.clone())?;
    restored.restore(serde_json::from_str::<NodeCheckpoint>(&saved)?)?;
    assert!(restored.is_waiting());

    let outcome = restored.run("make it shorter", &mut vars).await?;
    assert_eq!(outcome, RunOutcome::Completed { output: "final cut".into() });
    assert_eq!(editor.requests()[0].user, "make it shorter");
    assert_eq!(restored.status(), NodeStatus::Done);
    Ok(())
}

#[test]
fn empty_or_duplicate_members_are_rejected() {
    let err = AgentChain::builder("none").build().err();
    assert!(matches!(err, Some(AgentCoreError::InvalidConfig(_))));

    let err = AgentChain::builder("twins")
        .agent(Box::new(UserInputAgent::new("ask")))
        .agent(Box::new(UserInputAgent::new("ask")))
        .build()
        .err();
    assert!(matches!(err, Some(AgentCoreError::InvalidConfig(_))));
}

#[tokio::test]
async fn group_suspends_while_a_member_waits_for_the_user() -> anyhow::Result<()> {
    let writer = ScriptedClient::texts(["draft about rust"]);
    let mut group = AgentGroup::builder("desk")
        .agent(Box::new(UserInputAgent::new("ask")))
        .agent(Box::new(scripted_agent("writer", writer.clone())))
        .handoff_kind(HandoffKind::Direct, Some("writer".into()))
        .max_round(3)
        .build()?;
    let mut vars = Variables::new();

    let outcome = group.run("which topic?", &mut vars).await?;
    assert!(outcome.is_suspended());
    assert!(group.is_suspended());
    assert_eq!(outcome.output(), "which topic?");

    let outcome = group.resume("ask", "rust", &mut vars).await?;
    assert_eq!(outcome.output(), "draft about rust");
    assert_eq!(writer.requests()[0].user, "rust");
    assert_eq!(group.trace(), ["ask", "ask", "writer"]);
    assert_eq!(group.status(), NodeStatus::Done);
    Ok(())
}
