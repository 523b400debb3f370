//! Plain-text rendering helpers shared by the list/ready/show commands.

use eluent_core::model::Atom;

/// One line: id, status, priority, issue type, title.
pub fn print_atom_line(atom: &Atom) {
    println!(
        "{:<24} {:<11} P{} {:<8} {}",
        atom.id,
        atom.status,
        atom.priority.value(),
        atom.issue_type,
        atom.title
    );
}

/// Full multi-line rendering of one atom, for `show`.
pub fn print_atom_detail(atom: &Atom) {
    println!("{}", atom.id);
    println!("  title:       {}", atom.title);
    println!("  status:      {}", atom.status);
    println!("  issue_type:  {}", atom.issue_type);
    println!("  priority:    {}", atom.priority.value());
    if let Some(assignee) = &atom.assignee {
        println!("  assignee:    {assignee}");
    }
    if let Some(parent) = &atom.parent_id {
        println!("  parent:      {parent}");
    }
    if !atom.labels.is_empty() {
        println!("  labels:      {}", atom.labels.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    if let Some(reason) = &atom.close_reason {
        println!("  close_reason: {reason}");
    }
    println!("  created_at:  {}", atom.created_at.to_rfc3339());
    println!("  updated_at:  {}", atom.updated_at.to_rfc3339());
    if !atom.description.is_empty() {
        println!("  description:\n{}", indent(&atom.description));
    }
    if !atom.design.is_empty() {
        println!("  design:\n{}", indent(&atom.design));
    }
    if !atom.notes.is_empty() {
        println!("  notes:\n{}", indent(&atom.notes));
    }
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("    {line}")).collect::<Vec<_>>().join("\n")
}
