//! Service groups.
//!
//! Stricter than address groups: one unresolved member drops the whole group
//! with an error, and any group containing it fails in turn.

use crate::objects::CpObject;
use crate::resolve::Worklist;
use crate::scope::ConversionScope;
use crate::source::GroupEntry;

pub fn convert_service_groups(scope: &mut ConversionScope<'_>, groups: &[GroupEntry]) {
    let mut worklist = Worklist::new(groups.iter().map(|g| (g.meta.name.as_str(), g)));
    for group in groups {
        resolve(scope, &mut worklist, group);
    }
}

fn resolve(scope: &mut ConversionScope<'_>, worklist: &mut Worklist<'_, GroupEntry>, group: &GroupEntry) {
    let source = group.meta.name.as_str();
    if !worklist.start(source) {
        return;
    }

    let mut members = Vec::new();
    let mut complete = true;
    for member in &group.members {
        if let Some(service) = scope.base.service(member) {
            members.push(service.name.clone());
            continue;
        }
        if worklist.is_in_progress(member) {
            complete = false;
            scope.error(format!(
                "{source} services group can not be converted because it is part of a membership cycle through {member}"
            ));
            continue;
        }
        if let Some(nested) = worklist.pending(member) {
            resolve(scope, worklist, nested);
        }
        match scope.base.service_group(member) {
            Some(nested) => members.push(nested.name.clone()),
            None => {
                complete = false;
                scope.error(format!(
                    "{source} services group can not be converted because it contains non-existing member: {member}"
                ));
            }
        }
    }

    if complete {
        let name = scope.issue_name(source, "services group");
        let object = CpObject::service_group(name, members)
            .with_comments(group.meta.description.as_deref())
            .with_tags(group.meta.tags.iter().cloned());
        let target = scope.base.insert(object);
        scope.base.service_groups.insert(source.to_string(), target);
    }
    worklist.finish(source);
}
