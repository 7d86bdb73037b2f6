// Agglomerative clustering with the Ward criterion.

use log::{debug, info};
use std::collections::{BTreeMap, HashMap};

use crate::config::*;
use crate::geography::RegionGroup;
use crate::matrix::VoteMatrix;
use crate::pca::PcaResult;

/// One step of the dendrogram: `right` is merged into `left`.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    /// Ward distance, on the scale of euclidean distances.
    pub distance: f64,
    /// Number of points in the merged cluster.
    pub size: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ClusterAssignment {
    pub stations: Vec<StationId>,
    /// Labels in `1..=k`, numbered by first appearance in station order.
    pub labels: Vec<usize>,
    pub k: usize,
}

impl ClusterAssignment {
    pub fn label_of(&self, station: &StationId) -> Option<usize> {
        self.stations
            .iter()
            .position(|s| s == station)
            .map(|idx| self.labels[idx])
    }

    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for l in self.labels.iter() {
            sizes[l - 1] += 1;
        }
        sizes
    }

    /// For every cluster, how many of its stations fall in each region group.
    pub fn region_composition(&self, matrix: &VoteMatrix) -> Vec<BTreeMap<RegionGroup, usize>> {
        let regions: HashMap<&StationId, RegionGroup> =
            matrix.rows.iter().map(|r| (&r.station, r.region)).collect();
        let mut res: Vec<BTreeMap<RegionGroup, usize>> = vec![BTreeMap::new(); self.k];
        for (s, l) in self.stations.iter().zip(self.labels.iter()) {
            let region = regions.get(s).cloned().unwrap_or(RegionGroup::Autre);
            *res[l - 1].entry(region).or_insert(0) += 1;
        }
        res
    }
}

/// Clusters the stations of a PCA on their leading components.
pub fn cluster_stations(pca: &PcaResult, settings: &AnalysisSettings) -> ClusterAssignment {
    let points = pca.leading_coordinates(settings.retained_components);
    let merges = ward_linkage(&points);
    let labels = cut_tree(points.len(), &merges, settings.cluster_count);
    let k = labels.iter().cloned().max().unwrap_or(0);
    info!(
        "cluster_stations: {} stations in {} clusters",
        points.len(),
        k
    );
    ClusterAssignment {
        stations: pca.stations.clone(),
        labels,
        k,
    }
}

// Index in the condensed upper triangle, i != j.
fn condensed_index(n: usize, i: usize, j: usize) -> usize {
    let (a, b) = if i < j { (i, j) } else { (j, i) };
    n * a - a * (a + 1) / 2 + (b - a - 1)
}

/// Ward linkage with the nearest-neighbour chain algorithm.
///
/// Distances are updated with the Lance-Williams formula on squared euclidean
/// distances. The merges are returned in the order they were found, which is
/// not necessarily by increasing distance.
pub fn ward_linkage(points: &[Vec<f64>]) -> Vec<Merge> {
    let n = points.len();
    if n < 2 {
        return Vec::new();
    }
    let mut dist: Vec<f64> = vec![0.0; n * (n - 1) / 2];
    for i in 0..n {
        for j in (i + 1)..n {
            dist[condensed_index(n, i, j)] = points[i]
                .iter()
                .zip(points[j].iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
        }
    }

    let mut size: Vec<usize> = vec![1; n];
    let mut active: Vec<bool> = vec![true; n];
    let mut chain: Vec<usize> = Vec::with_capacity(n);
    let mut merges: Vec<Merge> = Vec::with_capacity(n - 1);

    while merges.len() < n - 1 {
        if chain.is_empty() {
            match (0..n).find(|i| active[*i]) {
                Some(first) => chain.push(first),
                None => break,
            }
        }
        // Grow the chain until two clusters are reciprocal nearest neighbours.
        let (a, b) = loop {
            let a = chain[chain.len() - 1];
            let prev = if chain.len() >= 2 {
                Some(chain[chain.len() - 2])
            } else {
                None
            };
            // The previous element wins ties, or the chain could cycle.
            let mut best = prev;
            let mut best_d = prev
                .map(|p| dist[condensed_index(n, a, p)])
                .unwrap_or(f64::INFINITY);
            for c in 0..n {
                if c == a || !active[c] {
                    continue;
                }
                let d = dist[condensed_index(n, a, c)];
                if d < best_d {
                    best = Some(c);
                    best_d = d;
                }
            }
            match best {
                Some(b) if Some(b) == prev => break (a, b),
                Some(b) => chain.push(b),
                None => break (a, a),
            }
        };
        if a == b {
            break;
        }
        chain.pop();
        chain.pop();

        let (keep, gone) = if a < b { (a, b) } else { (b, a) };
        let d_ab = dist[condensed_index(n, keep, gone)];
        let (n_keep, n_gone) = (size[keep] as f64, size[gone] as f64);
        for k in 0..n {
            if !active[k] || k == keep || k == gone {
                continue;
            }
            let n_k = size[k] as f64;
            let updated = ((n_keep + n_k) * dist[condensed_index(n, keep, k)]
                + (n_gone + n_k) * dist[condensed_index(n, gone, k)]
                - n_k * d_ab)
                / (n_keep + n_gone + n_k);
            dist[condensed_index(n, keep, k)] = updated;
        }
        active[gone] = false;
        size[keep] += size[gone];
        merges.push(Merge {
            left: keep,
            right: gone,
            distance: d_ab.max(0.0).sqrt(),
            size: size[keep],
        });
    }
    debug!("ward_linkage: {} merges for {} points", merges.len(), n);
    merges
}

/// Cuts the dendrogram into `k` groups (fewer if there are fewer points).
///
/// Returns one label per point, in `1..=k`, numbered by first appearance.
pub fn cut_tree(n: usize, merges: &[Merge], k: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let k = k.clamp(1, n);
    let mut sorted: Vec<Merge> = merges.to_vec();
    sorted.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut Vec<usize>, x: usize) -> usize {
        let mut root = x;
        while parent[root] != root {
            root = parent[root];
        }
        let mut cur = x;
        while parent[cur] != root {
            let next = parent[cur];
            parent[cur] = root;
            cur = next;
        }
        root
    }
    for m in sorted.iter().take(n - k) {
        let ra = find(&mut parent, m.left);
        let rb = find(&mut parent, m.right);
        if ra != rb {
            parent[rb] = ra;
        }
    }

    let mut labels_by_root: HashMap<usize, usize> = HashMap::new();
    let mut labels: Vec<usize> = Vec::with_capacity(n);
    for i in 0..n {
        let root = find(&mut parent, i);
        let next = labels_by_root.len() + 1;
        labels.push(*labels_by_root.entry(root).or_insert(next));
    }
    labels
}
