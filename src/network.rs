/*!
Clique assignment over the similarity network.

Features whose chromatograms correlate form the nodes of a weighted network.
Reading each weight as the probability that its two endpoints co-elute, the
log-likelihood of a partition into cliques is

```text
L = sum over same-clique pairs of ln(w)
  + sum over all other pairs of ln(1 - w)
```

with weights clamped away from 0 and 1 so every term stays finite. Only the
same-clique sum depends on the partition, so maximizing `L` is maximizing the
sum of `logit(w) = ln(w) - ln(1 - w)` over within-clique pairs, and a pair
pulls its endpoints together exactly when `w > 0.5`. This is the coelution
model of Senan et al., *CliqueMS: a computational tool for annotating
in-source metabolite ions from LC-MS untargeted metabolomics data*,
Bioinformatics 35(20), 2019.

[`CliqueNetwork`] stores the weights and the evolving partition;
[`NetworkSolver`] greedily maximizes `L` with merge and relocation rounds
until the gain falls below the configured tolerance.
*/

mod graph;
mod solve;

pub use graph::{CliqueId, CliqueNetwork};
pub use solve::NetworkSolver;

pub(crate) use solve::complete_assignments;
