/*!

This is the long-form manual for `vote_structure` and `voteatlas`.

## Input layout

Every input is one table (spreadsheet or CSV) with a header row. The path of the file
carries the election it belongs to:

| election type    | tag              | expected path                                  |
|------------------|------------------|------------------------------------------------|
| presidential     | `presidentielle` | `.../presidentielle-2022-1er_tour.xlsx`        |
| regional         | `regionale`      | `.../regionale-2021-2.csv`                     |
| European         | `europeenne`     | `.../europeenne-2019.xlsx` (single round)      |
| legislative      | `legislative`    | `.../2022-01/resultats_Circ_03.xlsx`           |
| municipal        | `municipale`     | `.../2020-02/resultats_Ardt_07.xlsx`           |

The round of legislative and municipal elections is read from the enclosing directory
(`<year>-01` or `<year>-02`). Their candidate rosters differ from one constituency or
district to the next, so each file becomes its own vote matrix.

A file that does not follow this convention is skipped and reported, the others are
processed normally.

## Normalization

Column names are harmonized first: `NbExprimés` and `Nb Exprimes` both become
`nb_exprimes`. Then, for each election type, a policy picks:
- the station identifier column (`id_bvote` by default),
- the grouping keys (`num_circ`, or `num_arrond` for municipal elections),
- the columns that are never vote counts: names starting with `nb_`, `num_`, `geo_`
  (and `st_` for some sources), the vote-status counters (`blancs`, `nuls`, `exprimes`,
  `abstentions`, `votants`, `inscrits`) and `objectid`.

Every other column is kept if all its values are numbers (decimal commas are accepted)
and none is negative. Empty cells count as zero.

The policy of an election type can be replaced in the study configuration:

```text
"policies": [
  {
    "electionType": "europeenne",
    "idColumn": "id_bvote",
    "groupColumns": ["num_circ"],
    "excludedPrefixes": ["nb_", "num_", "geo_", "st_", "pct_"],
    "excludedColumns": ["blancs", "nuls"]
  }
]
```

Station identifiers look like `<arrondissement>-<station>`. Leading zeros are removed
(`018-03` is the same station as `18-3`). The arrondissement places the station in one
of six region groups (`Centre`, `Nord`, `Nord-Est`, `Nord-Ouest`, `Sud-Est`,
`Sud-Ouest`); anything else is `Autre`.

## Analyses

- **PCA**: the vote counts are centered and scaled per candidate. At most
  `min(stations, candidates) - 1` components are reported. A matrix with fewer than 3
  stations or 2 candidates is not analyzed.
  The sign of a component is arbitrary: it is fixed here so that its largest loading
  is positive. Comparing two analyses should rely on distances and correlations, or
  use the `alignSigns` option of the shift analysis.
- **Clustering**: Ward agglomerative clustering on the first two components, cut into
  4 groups.
- **Shifts**: for two analyses of the same election type, the displacement of each
  common station on the first two components.
- **CCA**: canonical correlations between any two matrices, computed over the common
  stations sorted by identifier.

## Artifacts

All the results are tables. For the directory writer of `voteatlas`, each of them is a
CSV file:

```text
presidentielle/vote_matrix_2022_1er.csv
presidentielle/analysis/vote_matrix_2022_1er_variance.csv
presidentielle/analysis/vote_matrix_2022_1er_coordinates.csv
presidentielle/analysis/vote_matrix_2022_1er_contributions.csv
presidentielle/analysis/vote_matrix_2022_1er_clusters.csv
legislative/2022-01/vote_matrix_Circ_03.csv
presidentielle/analysis/shift/shift_presidentielle_2017_1er_vs_presidentielle_2022_1er.csv
cca/cca_presidentielle_2022_1er_vs_europeenne_2019_1er_axis1_r=0.993.csv
cca/cca_presidentielle_2022_1er_vs_europeenne_2019_1er_summary.csv
```

## Configuration

`voteatlas` reads a study file in JSON:

```text
{
  "outputSettings": {
    "studyName": "paris",
    "outputDirectory": "out"
  },
  "sources": [
    {
      "electionType": "presidentielle",
      "filePath": "presidentielle/presidentielle-2022-1er_tour.xlsx",
      "provider": "xlsx"
    },
    {
      "electionType": "europeenne",
      "filePath": "europeenne/europeenne-2019.csv",
      "provider": "csv",
      "csvDelimiter": ";"
    }
  ],
  "analysis": { "clusterCount": 4, "retainedComponents": 2 },
  "shiftPairs": [],
  "ccaPairs": [
    {
      "earlier": "presidentielle/vote_matrix_2022_1er",
      "later": "europeenne/vote_matrix_2019_1er"
    }
  ]
}
```

Relative file paths are resolved against the directory of the study file. Matrices in
pairs are named by their qualified name: the artifact path without extension.

 */
