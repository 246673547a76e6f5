//! CLI presence commands: one-shot writes and reads against the tracker.

use std::collections::BTreeMap;

use anyhow::Result;
use pulse_presence::PresenceTracker;
use serde_json::json;

use crate::terminal_output::{note_success, note_warn, print_json, render_table};

pub async fn join(tracker: &PresenceTracker, member: &str, communities: &[String], json: bool) -> Result<()> {
    let counts = tracker.add_member_to_communities(member, communities).await;
    if json {
        return print_json(&json!({ "member": member, "online": counts }));
    }
    note_success(&format!("{member} is online in {} communities", counts.len()));
    print!("{}", counts_table(&counts));
    Ok(())
}

/// Without a community the member leaves everywhere the reverse index lists.
pub async fn leave(tracker: &PresenceTracker, member: &str, community: Option<&str>, json: bool) -> Result<()> {
    match community {
        Some(community) => {
            let count = tracker.remove_member(member, community).await;
            if json {
                return print_json(&json!({ "member": member, "community": community, "online": count }));
            }
            note_success(&format!("{member} left {community} ({count} online)"));
        }
        None => {
            let left = tracker.remove_member_everywhere(member).await;
            if json {
                return print_json(&json!({ "member": member, "communitiesLeft": left }));
            }
            note_success(&format!("{member} left {left} communities"));
        }
    }
    Ok(())
}

pub async fn ping(tracker: &PresenceTracker, member: &str, community: &str, json: bool) -> Result<()> {
    let count = tracker.update_activity(member, community).await;
    if json {
        return print_json(&json!({ "member": member, "community": community, "online": count }));
    }
    note_success(&format!("{member} active in {community} ({count} online)"));
    Ok(())
}

pub async fn status(tracker: &PresenceTracker, community: &str, json: bool) -> Result<()> {
    let snapshot = tracker.analytics(community).await;
    if json {
        return print_json(&snapshot);
    }
    if !tracker.health().await {
        note_warn("presence store is unreachable; figures may be stale or zero");
    }
    println!("Community {community}");
    let rows = vec![
        vec!["online".to_string(), snapshot.online_count.to_string()],
        vec!["daily peak".to_string(), snapshot.daily_peak.to_string()],
        vec!["weekly peak".to_string(), snapshot.weekly_peak.to_string()],
        vec!["monthly peak".to_string(), snapshot.monthly_peak.to_string()],
    ];
    print!("{}", render_table(&["Metric", "Value"], &rows));
    println!("  updated {}", snapshot.last_updated.to_rfc3339());
    Ok(())
}

pub async fn members(tracker: &PresenceTracker, community: &str, json: bool) -> Result<()> {
    let mut members: Vec<String> = tracker.online_members(community).await.into_iter().collect();
    members.sort();
    if json {
        return print_json(&members);
    }
    if members.is_empty() {
        note_warn(&format!("nobody is online in {community}"));
    }
    for member in members {
        println!("{member}");
    }
    Ok(())
}

/// A member's communities when `member` is given, otherwise every online community.
pub async fn communities(tracker: &PresenceTracker, member: Option<&str>, json: bool) -> Result<()> {
    let names: Vec<String> = match member {
        Some(member) => {
            let mut names: Vec<String> = tracker.member_communities(member).await.into_iter().collect();
            names.sort();
            names
        }
        None => tracker.online_communities().await,
    };

    let mut counts = BTreeMap::new();
    for name in names {
        let count = tracker.online_count(&name).await;
        counts.insert(name, count);
    }
    if json {
        return print_json(&counts);
    }
    print!("{}", counts_table(&counts));
    Ok(())
}

fn counts_table(counts: &BTreeMap<String, u64>) -> String {
    let rows: Vec<Vec<String>> = counts
        .iter()
        .map(|(community, count)| vec![community.clone(), count.to_string()])
        .collect();
    render_table(&["Community", "Online"], &rows)
}
