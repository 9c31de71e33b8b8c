//! Redirect graph construction and the registry that owns the resulting
//! chains.
//!
//! Resources never move once a [`crate::resource::ResourceCollection`] is
//! frozen, so chain membership is recorded as plain resource indices rather
//! than references or pointers — the arena (`Vec<RedirectChain>` indexed by
//! [`ChainId`]) gives the registry stable, non-relocating handles without
//! any `unsafe`.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use indexmap::{IndexMap, IndexSet};

use crate::resource::Resource;

/// A stable handle into a [`RedirectRegistry`]'s chain arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(usize);

/// An ordered sequence of resource indices: zero or more REDIRECT
/// resources followed by either a terminus or a repeated (loop-closing)
/// member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectChain {
    members: Vec<usize>,
}

impl RedirectChain {
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn first(&self) -> Option<usize> {
        self.members.first().copied()
    }

    pub fn last(&self) -> Option<usize> {
        self.members.last().copied()
    }
}

/// The URL-to-URL multimap built over a frozen collection's redirects, and
/// the prioritized depth-first chain emission over it.
struct RedirectGraph {
    redirect_map: IndexMap<String, Vec<String>>,
    destinations: IndexSet<String>,
}

impl RedirectGraph {
    fn build(resources: &[Box<dyn Resource>]) -> Self {
        let mut redirect_map: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut destinations: IndexSet<String> = IndexSet::new();
        for resource in resources {
            if !resource.is_redirect() {
                continue;
            }
            if let Some(target) = resource.redirect_target() {
                redirect_map
                    .entry(resource.url().to_string())
                    .or_default()
                    .push(target.to_string());
                destinations.insert(target.to_string());
            }
        }
        Self {
            redirect_map,
            destinations,
        }
    }

    fn roots(&self) -> Vec<String> {
        let mut primary = Vec::new();
        let mut secondary = Vec::new();
        for source in self.redirect_map.keys() {
            if self.destinations.contains(source) {
                secondary.push(source.clone());
            } else {
                primary.push(source.clone());
            }
        }
        primary.into_iter().chain(secondary).collect()
    }

    fn emit_chains(&self, index_of_url: &dyn Fn(&str) -> Option<usize>) -> Vec<RedirectChain> {
        let roots = self.roots();
        let mut processed: HashSet<String> = HashSet::new();
        let mut chains = Vec::new();

        for root in &roots {
            if processed.contains(root) {
                continue;
            }
            let mut members = Vec::new();
            let mut stack = vec![root.clone()];
            while let Some(current) = stack.pop() {
                let Some(idx) = index_of_url(&current) else {
                    warn!(url = %current, "redirect target missing from resource collection");
                    continue;
                };
                members.push(idx);
                if processed.contains(&current) {
                    continue;
                }
                processed.insert(current.clone());
                if let Some(targets) = self.redirect_map.get(&current) {
                    for target in targets.iter().rev() {
                        stack.push(target.clone());
                    }
                }
            }
            chains.push(RedirectChain { members });
        }
        chains
    }
}

/// Owns the vector of redirect chains discovered for a frozen resource
/// collection, plus the resource→chain lookup and the landing-page
/// fix-up against the request-ordered view.
pub struct RedirectRegistry {
    chains: Vec<RedirectChain>,
    resource_to_chain: HashMap<usize, ChainId>,
}

impl RedirectRegistry {
    pub(crate) fn init(
        resources: &[Box<dyn Resource>],
        index_of_url: impl Fn(&str) -> Option<usize>,
        primary_index: Option<usize>,
        request_order: &[usize],
    ) -> Self {
        let graph = RedirectGraph::build(resources);
        let mut chains = graph.emit_chains(&index_of_url);

        let mut resource_to_chain: HashMap<usize, ChainId> = HashMap::new();
        for (i, chain) in chains.iter().enumerate() {
            for &member in chain.members() {
                resource_to_chain.entry(member).or_insert(ChainId(i));
            }
        }

        if let Some(fixup) = build_fixup_chain(resources, request_order) {
            let landing = primary_index.unwrap_or_else(|| fixup.last().unwrap());
            let primary_len = resource_to_chain
                .get(&landing)
                .map(|cid| chains[cid.0].len());
            let should_replace = match primary_len {
                None => true,
                Some(len) => fixup.len() > len,
            };
            if should_replace {
                replace_with_fixup(&mut chains, &mut resource_to_chain, fixup);
            }
        }

        Self {
            chains,
            resource_to_chain,
        }
    }

    pub fn chains(&self) -> &[RedirectChain] {
        &self.chains
    }

    pub fn chain_for(&self, resource_index: usize) -> Option<&RedirectChain> {
        self.resource_to_chain
            .get(&resource_index)
            .map(|cid| &self.chains[cid.0])
    }

    /// The last resource in `resource_index`'s chain, or `resource_index`
    /// itself when it belongs to no chain.
    pub fn final_target(&self, resource_index: usize) -> usize {
        match self.chain_for(resource_index) {
            Some(chain) => chain.last().unwrap_or(resource_index),
            None => resource_index,
        }
    }
}

fn build_fixup_chain(resources: &[Box<dyn Resource>], request_order: &[usize]) -> Option<Vec<usize>> {
    if request_order.is_empty() {
        return None;
    }
    let mut members = Vec::new();
    for &idx in request_order {
        let resource = resources[idx].as_ref();
        members.push(idx);
        if !resource.is_redirect() {
            break;
        }
    }
    if members.is_empty() {
        None
    } else {
        Some(members)
    }
}

fn replace_with_fixup(
    chains: &mut Vec<RedirectChain>,
    resource_to_chain: &mut HashMap<usize, ChainId>,
    fixup: Vec<usize>,
) {
    let fixup_members: HashSet<usize> = fixup.iter().copied().collect();

    let old_chains = std::mem::take(chains);
    let mut old_to_new: HashMap<usize, usize> = HashMap::new();
    for (old_index, chain) in old_chains.into_iter().enumerate() {
        let remove = chain.first().is_some_and(|first| fixup_members.contains(&first));
        if remove {
            continue;
        }
        old_to_new.insert(old_index, chains.len());
        chains.push(chain);
    }

    resource_to_chain.retain(|_, cid| old_to_new.contains_key(&cid.0));
    for cid in resource_to_chain.values_mut() {
        cid.0 = old_to_new[&cid.0];
    }

    let new_chain_id = ChainId(chains.len());
    for &member in &fixup {
        resource_to_chain.insert(member, new_chain_id);
    }
    chains.push(RedirectChain { members: fixup });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ResourceCollection, StaticResource};

    fn idx_of<'a>(resources: &'a [Box<dyn Resource>], url: &str) -> Option<usize> {
        resources.iter().position(|r| r.url() == url)
    }

    #[test]
    fn simple_chain_a_to_b_to_c() {
        let mut c = ResourceCollection::new();
        c.add(Box::new(StaticResource::redirect("https://a/", 302, "https://b/")))
            .unwrap();
        c.add(Box::new(StaticResource::redirect("https://b/", 302, "https://c/")))
            .unwrap();
        c.add(Box::new(StaticResource::terminal("https://c/", 200)))
            .unwrap();
        c.freeze();

        let registry = c.registry().unwrap();
        assert_eq!(registry.chains().len(), 1);
        let a = c.index_of_url("https://a/").unwrap();
        let cc = c.index_of_url("https://c/").unwrap();
        assert_eq!(registry.final_target(a), cc);
        assert_eq!(registry.chain_for(a).unwrap().len(), 3);
    }

    #[test]
    fn loop_a_to_b_to_a_terminates() {
        let mut c = ResourceCollection::new();
        c.add(Box::new(StaticResource::redirect("https://a/", 302, "https://b/")))
            .unwrap();
        c.add(Box::new(StaticResource::redirect("https://b/", 302, "https://a/")))
            .unwrap();
        c.freeze();

        let registry = c.registry().unwrap();
        // a is not a destination, so it is the sole PRIMARY root; the
        // traversal breaks the loop once it revisits a processed node.
        assert_eq!(registry.chains().len(), 1);
        let chain = &registry.chains()[0];
        assert!(chain.len() >= 2);
    }

    #[test]
    fn missing_target_is_skipped_not_fatal() {
        let mut c = ResourceCollection::new();
        c.add(Box::new(StaticResource::redirect(
            "https://a/",
            302,
            "https://never-observed/",
        )))
        .unwrap();
        c.freeze();

        let registry = c.registry().unwrap();
        assert_eq!(registry.chains().len(), 1);
        let a = c.index_of_url("https://a/").unwrap();
        assert_eq!(registry.chains()[0].members(), &[a]);
    }

    #[test]
    fn multiple_sources_into_one_destination() {
        let mut c = ResourceCollection::new();
        c.add(Box::new(StaticResource::redirect("https://a/", 302, "https://z/")))
            .unwrap();
        c.add(Box::new(StaticResource::redirect("https://b/", 302, "https://z/")))
            .unwrap();
        c.add(Box::new(StaticResource::terminal("https://z/", 200)))
            .unwrap();
        c.freeze();

        let registry = c.registry().unwrap();
        assert_eq!(registry.chains().len(), 2);
        let a = c.index_of_url("https://a/").unwrap();
        let b = c.index_of_url("https://b/").unwrap();
        let z = c.index_of_url("https://z/").unwrap();
        assert_eq!(registry.final_target(a), z);
        assert_eq!(registry.final_target(b), z);
    }

    #[test]
    fn landing_page_fixup_replaces_shorter_chain() {
        let mut c = ResourceCollection::new();
        // A is a redirect but its target can't be computed from the
        // observation (e.g. a missing Location header), so the graph
        // never learns A -> B on its own.
        c.add(Box::new(
            StaticResource {
                url: "https://a/".into(),
                status: 302,
                start_time_ms: Some(0),
                kind: crate::resource::ResourceKind::Redirect { target: None },
            },
        ))
        .unwrap();
        c.add(Box::new(
            StaticResource::redirect("https://b/", 302, "https://c/").with_start_time_ms(1),
        ))
        .unwrap();
        c.add(Box::new(
            StaticResource::terminal("https://c/", 200).with_start_time_ms(2),
        ))
        .unwrap();
        c.set_primary_url("https://a/").unwrap();
        c.freeze();

        let registry = c.registry().unwrap();
        let a = c.index_of_url("https://a/").unwrap();
        let b = c.index_of_url("https://b/").unwrap();
        let cc = c.index_of_url("https://c/").unwrap();

        let chain = registry.chain_for(a).expect("fixup chain installed for a");
        assert_eq!(chain.members(), &[a, b, cc]);
    }

    #[test]
    fn idx_of_helper_is_consistent_with_collection_lookup() {
        let mut c = ResourceCollection::new();
        c.add(Box::new(StaticResource::terminal("https://a/", 200)))
            .unwrap();
        c.freeze();
        assert_eq!(
            idx_of(c.resources(), "https://a/"),
            c.index_of_url("https://a/")
        );
    }
}
