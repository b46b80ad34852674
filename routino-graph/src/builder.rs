//! The graph builder pipeline (§4.D), steps 1-15.
//!
//! The tagging layer (outside this crate's scope, per the governing
//! interface contract) drives the builder purely through
//! [`Builder::append_node`], [`Builder::append_way`],
//! [`Builder::append_segment`], [`Builder::append_route_relation`] and
//! [`Builder::append_turn_relation`]. Everything from there on — sorting,
//! deduplication, measurement, pruning, super-graph construction and the
//! final compact-file write — is internal.

use std::collections::HashMap;

use tracing::info;

use routino_common::geo::haversine_distance_m;
use routino_common::property::{Properties, Property};
use routino_common::transport::Transports;
use routino_common::units::{self, radians_to_latlong, DistanceT, IndexT, LatLongT, NO_NODE, NO_SEGMENT};

use crate::config::Config;
use crate::error::{BuildResult, BuildWarning};
use crate::prune;
use crate::supergraph;
use crate::xstore::nodes::{NodeX, NodeXFlags};
use crate::xstore::relations::{RouteRelationX, TurnRelation as XTurnRelation, TurnRelationX};
use crate::xstore::segments::SegmentX;
use crate::xstore::ways::{WayAttributes, WayX};
use crate::xstore::XStore;

pub struct Builder {
    pub(crate) config: Config,
    pub(crate) nodes: XStore<NodeX>,
    pub(crate) segments: XStore<SegmentX>,
    ways: XStore<WayX>,
    route_relations: Vec<RouteRelationX>,
    raw_turn_relations: Vec<(i64, i64, i64, bool, Transports)>,
    turn_relations_phase1: Vec<TurnRelationX>,
    pub(crate) turn_relations: Vec<XTurnRelation>,
    id_to_index: HashMap<i64, IndexT>,
    way_id_to_index: HashMap<i64, IndexT>,
    deduped_ways: Vec<WayAttributes>,
    pub warnings: Vec<BuildWarning>,
}

/// The final product of the builder pipeline: everything the compact-file
/// writers in `crate::compact` need, plus the geographic bin grid.
pub struct BuiltGraph {
    pub nodes: Vec<BuiltNode>,
    pub segments: Vec<SegmentX>,
    pub ways: Vec<WayAttributes>,
    pub turn_relations: Vec<XTurnRelation>,
    pub lat_bins: i32,
    pub lon_bins: i32,
    pub lat_zero: i16,
    pub lon_zero: i16,
    pub bin_offsets: Vec<IndexT>,
    pub n_super: u32,
    /// Every kind-1 warning accumulated during parsing and the pipeline
    /// itself (§7) — logged and skipped, never fatal.
    pub warnings: Vec<BuildWarning>,
}

pub struct BuiltNode {
    pub lat: LatLongT,
    pub lon: LatLongT,
    pub allow: Transports,
    pub flags: NodeXFlags,
    pub first_segment: IndexT,
    pub first_segment2: IndexT,
}

impl Builder {
    pub fn new(config: Config) -> Self {
        Builder {
            nodes: XStore::new(config.store_mode),
            segments: XStore::new(config.store_mode),
            ways: XStore::new(config.store_mode),
            route_relations: Vec::new(),
            raw_turn_relations: Vec::new(),
            turn_relations_phase1: Vec::new(),
            turn_relations: Vec::new(),
            id_to_index: HashMap::new(),
            way_id_to_index: HashMap::new(),
            deduped_ways: Vec::new(),
            warnings: Vec::new(),
            config,
        }
    }

    // ---- tagging-layer interface (§6) -----------------------------------

    pub fn append_node(&mut self, id: i64, lat_degrees: f64, lon_degrees: f64, allow: Transports) {
        let lat = radians_to_latlong(units::degrees_to_radians(lat_degrees));
        let lon = radians_to_latlong(units::degrees_to_radians(lon_degrees));
        self.nodes.append(NodeX::new(id, lat, lon, allow));
    }

    pub fn append_way(&mut self, id: i64, attrs: WayAttributes) -> u32 {
        self.ways.append(WayX::new(id, attrs))
    }

    pub fn append_segment(&mut self, node1_id: i64, node2_id: i64, way_id: i64, area: bool, oneway_1to2: bool, oneway_2to1: bool) {
        self.segments
            .append(SegmentX::new(node1_id, node2_id, way_id, area, oneway_1to2, oneway_2to1));
    }

    pub fn append_route_relation(&mut self, id: i64, routes: Transports, way_ids: Vec<i64>, relation_ids: Vec<i64>) {
        self.route_relations.push(RouteRelationX::new(id, routes, way_ids, relation_ids));
    }

    pub fn append_turn_relation(&mut self, via_node_id: i64, from_way_id: i64, to_way_id: i64, is_no_turn: bool, except: Transports) {
        self.raw_turn_relations.push((via_node_id, from_way_id, to_way_id, is_no_turn, except));
    }

    // ---- pipeline --------------------------------------------------------

    pub fn build(mut self) -> BuildResult<BuiltGraph> {
        self.step1_sort_nodes();
        self.step2_sort_segments();
        self.step3_remove_unused_nodes();

        self.ways.sort_by(|a, b| a.id.cmp(&b.id));
        self.ways.build_id_index(|w| w.id);

        self.step4_route_relations();
        self.step5_turn_relations_phase1();
        self.step6_compact_ways();
        self.step7_measure_and_resolve_segments();
        self.step8_index_segments();
        self.step9_turn_relations_phase2();

        if !matches!(self.config.prune_isolated, crate::config::PruneIsolated::Disabled) {
            prune::prune_isolated(&mut self);
        }
        if !matches!(self.config.prune_short, crate::config::PruneShort::Disabled) {
            prune::prune_short_segments(&mut self);
        }
        if !matches!(self.config.prune_straight, crate::config::PruneStraight::Disabled) {
            prune::prune_straight_runs(&mut self);
        }

        let super_nodes = supergraph::build(&mut self)?;

        self.step13_geographic_sort();
        self.finalize(super_nodes)
    }

    fn step1_sort_nodes(&mut self) {
        info!("step 1: sorting {} nodes by OSM id", self.nodes.len());
        self.nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut dups = Vec::new();
        {
            let slice = self.nodes.as_slice();
            for w in slice.windows(2) {
                if w[0].id == w[1].id {
                    dups.push(w[1].id);
                }
            }
        }
        for id in dups {
            self.warnings.push(BuildWarning::DuplicateNode { id });
        }
        self.nodes.build_id_index(|n| n.id);
    }

    fn step2_sort_segments(&mut self) {
        info!("step 2: sorting {} segments by (node1, node2)", self.segments.len());
        self.segments.sort_by(|a, b| (a.node1_id, a.node2_id).cmp(&(b.node1_id, b.node2_id)));

        let mut warnings = Vec::new();
        let mut last: Option<(i64, i64)> = None;
        for seg in self.segments.as_mut_slice() {
            if seg.node1_id == seg.node2_id {
                warnings.push(BuildWarning::SelfLoopSegment { node1: seg.node1_id, node2: seg.node2_id });
                seg.deleted = true;
                continue;
            }
            let key = (seg.node1_id, seg.node2_id);
            if last == Some(key) {
                seg.deleted = true;
                warnings.push(BuildWarning::DuplicateSegment { node1: seg.node1_id, node2: seg.node2_id });
                continue;
            }
            last = Some(key);
        }
        self.warnings.append(&mut warnings);

        for i in 0..self.segments.len() {
            let (n1_id, n2_id, deleted) = {
                let s = &self.segments.as_slice()[i];
                (s.node1_id, s.node2_id, s.deleted)
            };
            if deleted {
                continue;
            }
            let n1 = self.nodes.lookup_by_id(n1_id);
            let n2 = self.nodes.lookup_by_id(n2_id);
            match (n1, n2) {
                (Some(a), Some(b)) => {
                    self.nodes.lookup_by_index_mut(a, 0).used = true;
                    self.nodes.lookup_by_index_mut(b, 1).used = true;
                }
                (None, _) => {
                    self.segments.as_mut_slice()[i].deleted = true;
                    self.warnings.push(BuildWarning::DanglingSegmentNode { missing_id: n1_id });
                }
                (_, None) => {
                    self.segments.as_mut_slice()[i].deleted = true;
                    self.warnings.push(BuildWarning::DanglingSegmentNode { missing_id: n2_id });
                }
            }
        }
    }

    fn step3_remove_unused_nodes(&mut self) {
        let before = self.nodes.len();
        let mut remap: HashMap<i64, IndexT> = HashMap::new();
        let mut kept = XStore::new(self.config.store_mode);
        for node in self.nodes.as_slice() {
            if node.used {
                let new_idx = kept.append(node.clone());
                remap.insert(node.id, new_idx);
            }
        }
        info!("step 3: kept {}/{} nodes with highway membership", kept.len(), before);
        kept.build_id_index(|n| n.id);
        self.nodes = kept;
        self.id_to_index = remap;
    }

    fn step4_route_relations(&mut self) {
        info!("step 4: propagating {} route relations", self.route_relations.len());
        let mut by_id: HashMap<i64, usize> = self.route_relations.iter().enumerate().map(|(i, r)| (r.id, i)).collect();

        for _round in 0..8 {
            let mut changed = false;
            let ids: Vec<i64> = self.route_relations.iter().map(|r| r.id).collect();
            for id in ids {
                let i = by_id[&id];
                if self.route_relations[i].resolved {
                    continue;
                }
                if self.route_relations[i].relation_ids.contains(&id) {
                    self.warnings.push(BuildWarning::SelfReferentialRelation { id });
                    self.route_relations[i].resolved = true;
                    continue;
                }

                let routes = self.route_relations[i].routes;
                let bits = route_bits_to_property_bits(routes);
                if bits != Properties::empty() {
                    for way_id in self.route_relations[i].way_ids.clone() {
                        if let Some(way_idx) = self.ways.lookup_by_id(way_id) {
                            self.ways.lookup_by_index_mut(way_idx, 0).attrs.properties |= bits;
                        }
                    }
                }

                let child_ids = self.route_relations[i].relation_ids.clone();
                for child_id in &child_ids {
                    if let Some(&ci) = by_id.get(child_id) {
                        if ci != i {
                            self.route_relations[ci].routes |= routes;
                        }
                    }
                }
                self.route_relations[i].resolved = true;
                changed = true;
            }
            if !changed {
                break;
            }
            by_id = self.route_relations.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
        }
    }

    fn step5_turn_relations_phase1(&mut self) {
        info!("step 5: resolving {} turn relations (phase 1)", self.raw_turn_relations.len());
        for (via_id, from_way_id, to_way_id, is_no_turn, except) in std::mem::take(&mut self.raw_turn_relations) {
            let via = match self.nodes.lookup_by_id(via_id) {
                Some(i) => i,
                None => {
                    self.warnings.push(BuildWarning::DanglingTurnRelation);
                    continue;
                }
            };
            if self.ways.lookup_by_id(from_way_id).is_none() || self.ways.lookup_by_id(to_way_id).is_none() {
                self.warnings.push(BuildWarning::DanglingTurnRelation);
                continue;
            }
            self.turn_relations_phase1
                .push(TurnRelationX::new(via, from_way_id, to_way_id, is_no_turn, except));
        }
    }

    fn step6_compact_ways(&mut self) {
        info!("step 6: deduplicating {} ways by (name, attributes)", self.ways.len());
        self.ways.sort_by(|a, b| a.attrs.cmp(&b.attrs).then(a.id.cmp(&b.id)));

        let mut dedup: Vec<WayAttributes> = Vec::new();
        for way in self.ways.as_mut_slice() {
            if dedup.last() != Some(&way.attrs) {
                dedup.push(way.attrs.clone());
            }
            way.prop = (dedup.len() - 1) as IndexT;
        }
        info!("step 6: {} distinct way attribute sets", dedup.len());
        self.deduped_ways = dedup;

        self.ways.sort_by(|a, b| a.id.cmp(&b.id));
        self.ways.build_id_index(|w| w.id);
        self.way_id_to_index = self
            .ways
            .as_slice()
            .iter()
            .enumerate()
            .map(|(i, w)| (w.id, i as IndexT))
            .collect();
    }

    fn step7_measure_and_resolve_segments(&mut self) {
        info!("step 7: measuring and resolving {} segments", self.segments.len());
        for i in 0..self.segments.len() {
            if self.segments.as_slice()[i].deleted {
                continue;
            }
            let (n1_id, n2_id, way_id) = {
                let s = &self.segments.as_slice()[i];
                (s.node1_id, s.node2_id, s.way_id)
            };
            let n1 = self.id_to_index[&n1_id];
            let n2 = self.id_to_index[&n2_id];
            let way_x_idx = self.way_id_to_index[&way_id];
            let way_prop = self.ways.as_slice()[way_x_idx as usize].prop;

            let a = &self.nodes.as_slice()[n1 as usize];
            let b = &self.nodes.as_slice()[n2 as usize];
            let distance = if self.segments.as_slice()[i].area {
                0
            } else {
                haversine_distance_m(a.lat, a.lon, b.lat, b.lon).round() as DistanceT
            };

            let seg = &mut self.segments.as_mut_slice()[i];
            seg.node1 = n1;
            seg.node2 = n2;
            seg.way = way_prop;
            seg.distance = distance;
            seg.canonicalize_endpoints();
        }
    }

    fn step8_index_segments(&mut self) {
        info!("step 8: building adjacency chains");
        let (head1, head2) = index_adjacency(&mut self.segments, self.nodes.len());
        for (i, node) in self.nodes.as_mut_slice().iter_mut().enumerate() {
            node.first_segment = head1[i];
            node.first_segment2 = head2[i];
        }
    }

    fn step9_turn_relations_phase2(&mut self) {
        info!(
            "step 9: resolving {} phase-1 turn relations against specific segments",
            self.turn_relations_phase1.len()
        );
        let mut resolved = Vec::new();
        let phase1 = std::mem::take(&mut self.turn_relations_phase1);
        for tr in phase1 {
            let from_prop = self.way_id_to_index.get(&tr.from_way_id).map(|&i| self.ways.as_slice()[i as usize].prop);
            let to_prop = self.way_id_to_index.get(&tr.to_way_id).map(|&i| self.ways.as_slice()[i as usize].prop);
            let (Some(from_prop), Some(to_prop)) = (from_prop, to_prop) else {
                self.warnings.push(BuildWarning::DanglingTurnRelation);
                continue;
            };

            let incident = self.incident_segments(tr.via_node);
            let from_seg = incident.iter().find(|&&s| self.segments.as_slice()[s as usize].way == from_prop).copied();

            let Some(from_seg) = from_seg else {
                self.warnings.push(BuildWarning::DanglingTurnRelation);
                continue;
            };

            if tr.is_no_turn {
                if let Some(&to_seg) = incident.iter().find(|&&s| self.segments.as_slice()[s as usize].way == to_prop) {
                    resolved.push(XTurnRelation {
                        from_segment: from_seg,
                        via_node: tr.via_node,
                        to_segment: to_seg,
                        except: tr.except,
                    });
                }
            } else {
                for &other in &incident {
                    if other == from_seg {
                        continue;
                    }
                    if self.segments.as_slice()[other as usize].way == to_prop {
                        continue;
                    }
                    resolved.push(XTurnRelation {
                        from_segment: from_seg,
                        via_node: tr.via_node,
                        to_segment: other,
                        except: tr.except,
                    });
                }
            }

            self.nodes.as_mut_slice()[tr.via_node as usize].flags |= NodeXFlags::TURN_RESTRICTED;
            for &s in &incident {
                let other_end = self.segments.as_slice()[s as usize].other_node_idx(tr.via_node);
                if let Some(n) = self.nodes.as_mut_slice().get_mut(other_end as usize) {
                    n.flags |= NodeXFlags::TURN_RESTRICTED2;
                }
            }
        }
        resolved.sort_by(|a, b| (a.via_node, a.from_segment, a.to_segment).cmp(&(b.via_node, b.from_segment, b.to_segment)));
        self.turn_relations = resolved;
    }

    fn step13_geographic_sort(&mut self) {
        info!("step 13: sorting nodes geographically");
        let mut order: Vec<usize> = (0..self.nodes.len()).collect();
        let nodes_ref = self.nodes.as_slice();
        order.sort_by(|&a, &b| {
            let na = &nodes_ref[a];
            let nb = &nodes_ref[b];
            let abin = units::latlong_to_bin(na.lon);
            let bbin = units::latlong_to_bin(nb.lon);
            abin.cmp(&bbin)
                .then_with(|| units::latlong_to_bin(na.lat).cmp(&units::latlong_to_bin(nb.lat)))
                .then_with(|| na.lon.cmp(&nb.lon))
                .then_with(|| na.lat.cmp(&nb.lat))
        });

        let mut remap = vec![0u32; self.nodes.len()];
        for (new_idx, &old_idx) in order.iter().enumerate() {
            remap[old_idx] = new_idx as IndexT;
        }

        let old_slice = self.nodes.as_slice().to_vec();
        let mut new_store = XStore::new(self.config.store_mode);
        for &old_idx in &order {
            new_store.append(old_slice[old_idx].clone());
        }
        self.nodes = new_store;

        for seg in self.segments.as_mut_slice() {
            if seg.deleted {
                continue;
            }
            seg.node1 = remap[seg.node1 as usize];
            seg.node2 = remap[seg.node2 as usize];
            seg.canonicalize_endpoints();
        }
        for tr in &mut self.turn_relations {
            tr.via_node = remap[tr.via_node as usize];
        }

        let (head1, head2) = index_adjacency(&mut self.segments, self.nodes.len());
        for (i, node) in self.nodes.as_mut_slice().iter_mut().enumerate() {
            node.first_segment = head1[i];
            node.first_segment2 = head2[i];
        }
    }

    fn finalize(self, super_nodes: std::collections::HashSet<IndexT>) -> BuildResult<BuiltGraph> {
        let (lat_min, lat_max, lon_min, lon_max) = bounding_box(self.nodes.as_slice());
        let lat_zero = units::latlong_to_bin(lat_min);
        let lon_zero = units::latlong_to_bin(lon_min);
        let lat_bins = (units::latlong_to_bin(lat_max) - lat_zero) as i32 + 1;
        let lon_bins = (units::latlong_to_bin(lon_max) - lon_zero) as i32 + 1;

        let mut bin_offsets = vec![0u32; (lat_bins as usize) * (lon_bins as usize) + 1];
        for n in self.nodes.as_slice() {
            let by = (units::latlong_to_bin(n.lat) - lat_zero) as usize;
            let bx = (units::latlong_to_bin(n.lon) - lon_zero) as usize;
            bin_offsets[by * lon_bins as usize + bx + 1] += 1;
        }
        for i in 1..bin_offsets.len() {
            bin_offsets[i] += bin_offsets[i - 1];
        }

        let n_super = super_nodes.len() as u32;
        let mut built_nodes = Vec::with_capacity(self.nodes.len());
        for (i, n) in self.nodes.as_slice().iter().enumerate() {
            let mut flags = n.flags;
            if super_nodes.contains(&(i as IndexT)) {
                flags |= NodeXFlags::SUPER;
            }
            built_nodes.push(BuiltNode {
                lat: n.lat,
                lon: n.lon,
                allow: n.allow,
                flags,
                first_segment: n.first_segment,
                first_segment2: n.first_segment2,
            });
        }

        // index_adjacency never points a chain at a deleted segment, but it
        // does number chain links by position in the pre-filter array, so
        // dropping deleted entries here has to renumber every next1/next2
        // and first_segment/first_segment2 pointer to match.
        let raw_segments = self.segments.into_vec();
        let mut new_index = vec![units::NO_SEGMENT; raw_segments.len()];
        let mut segments = Vec::with_capacity(raw_segments.len());
        for (old_idx, seg) in raw_segments.into_iter().enumerate() {
            if !seg.deleted {
                new_index[old_idx] = segments.len() as IndexT;
                segments.push(seg);
            }
        }
        let remap_segment = |idx: IndexT| if idx == NO_SEGMENT { NO_SEGMENT } else { new_index[idx as usize] };
        for seg in &mut segments {
            seg.next1 = remap_segment(seg.next1);
            seg.next2 = remap_segment(seg.next2);
        }
        for node in &mut built_nodes {
            node.first_segment = remap_segment(node.first_segment);
            node.first_segment2 = remap_segment(node.first_segment2);
        }

        info!(
            "build complete: {} nodes, {} segments, {} ways, {} turn relations, {} super-nodes, {} warnings",
            built_nodes.len(),
            segments.len(),
            self.deduped_ways.len(),
            self.turn_relations.len(),
            n_super,
            self.warnings.len()
        );

        Ok(BuiltGraph {
            nodes: built_nodes,
            segments,
            ways: self.deduped_ways,
            turn_relations: self.turn_relations,
            lat_bins,
            lon_bins,
            lat_zero: lat_zero as i16,
            lon_zero: lon_zero as i16,
            bin_offsets,
            n_super,
            warnings: self.warnings,
        })
    }

    /// The deduplicated attribute bundle a (final, post-step-6) way index
    /// refers to. Used by super-node selection (§4.E) to compare ways.
    pub(crate) fn way_attrs(&self, way: IndexT) -> &WayAttributes {
        &self.deduped_ways[way as usize]
    }

    /// Rebuilds the `next1`/`next2` adjacency chains and each node's chain
    /// heads. The pruning passes (§4.D.1) call this between rounds since
    /// each round deletes segments and splices in new ones.
    pub(crate) fn reindex_adjacency(&mut self) {
        let (head1, head2) = index_adjacency(&mut self.segments, self.nodes.len());
        for (i, node) in self.nodes.as_mut_slice().iter_mut().enumerate() {
            node.first_segment = head1[i];
            node.first_segment2 = head2[i];
        }
    }

    /// All segments incident to `node`, walking both the `node1` and `node2`
    /// chains built in step 8 (or rebuilt after step 13's renumbering).
    pub(crate) fn incident_segments(&self, node: IndexT) -> Vec<IndexT> {
        let mut out = Vec::new();
        let slice = self.segments.as_slice();

        let mut cur = self.nodes.as_slice()[node as usize].first_segment;
        while cur != NO_SEGMENT {
            out.push(cur);
            cur = slice[cur as usize].next1;
        }

        let mut cur = self.nodes.as_slice()[node as usize].first_segment2;
        while cur != NO_SEGMENT {
            out.push(cur);
            cur = slice[cur as usize].next2;
        }

        out
    }
}

fn route_bits_to_property_bits(routes: Transports) -> Properties {
    let mut bits = Properties::empty();
    if routes.contains(Transports::FOOT) {
        bits |= Properties::from(Property::FootRoute);
    }
    if routes.contains(Transports::BICYCLE) {
        bits |= Properties::from(Property::BicycleRoute);
    }
    bits
}

fn bounding_box(nodes: &[NodeX]) -> (LatLongT, LatLongT, LatLongT, LatLongT) {
    let mut lat_min = i32::MAX;
    let mut lat_max = i32::MIN;
    let mut lon_min = i32::MAX;
    let mut lon_max = i32::MIN;
    for n in nodes {
        lat_min = lat_min.min(n.lat);
        lat_max = lat_max.max(n.lat);
        lon_min = lon_min.min(n.lon);
        lon_max = lon_max.max(n.lon);
    }
    if nodes.is_empty() {
        (0, 0, 0, 0)
    } else {
        (lat_min, lat_max, lon_min, lon_max)
    }
}

/// Builds the `next1`/`next2` incidence chains (§4.D step 8) by walking the
/// segment array once in reverse, so that walking a chain forward from its
/// head yields segments in ascending array-index order. Returns the
/// per-node chain heads (`first_segment`, `first_segment2`).
pub(crate) fn index_adjacency(segments: &mut XStore<SegmentX>, n_nodes: usize) -> (Vec<IndexT>, Vec<IndexT>) {
    let mut head1 = vec![NO_NODE; n_nodes];
    let mut head2 = vec![NO_NODE; n_nodes];

    let slice = segments.as_mut_slice();
    for i in (0..slice.len()).rev() {
        if slice[i].deleted {
            continue;
        }
        let n1 = slice[i].node1 as usize;
        let n2 = slice[i].node2 as usize;
        slice[i].next1 = head1[n1];
        head1[n1] = i as IndexT;
        slice[i].next2 = head2[n2];
        head2[n2] = i as IndexT;
    }

    (head1, head2)
}

impl SegmentX {
    pub fn other_node_idx(&self, n: IndexT) -> IndexT {
        if n == self.node1 {
            self.node2
        } else {
            self.node1
        }
    }
}
