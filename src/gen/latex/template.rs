//! Fixed parts of the generated document. Adjust to taste.

pub const PREAMBLE: &str = r"\documentclass[a4paper]{article}
\usepackage{polyglossia}
\setmainlanguage{spanish}
\usepackage{fontspec}
\setmainfont{Nimbus Sans}
\setmonofont[Scale=MatchLowercase, Contextuals={AlternateOff}]{Fantasque Sans Mono}
\usepackage{unicode-math}
\setmathfont{XITS Math}
\usepackage[hmargin=2.25cm, vmargin=2.5cm]{geometry}
\usepackage{minted}
\usepackage{fancyvrb}
\usepackage{xcolor}
\usepackage{graphicx}
\usepackage[colorlinks]{hyperref}
\usepackage{booktabs}
\usepackage{fancyhdr}
";

/// Expects `\authors` to be defined
pub const BEGIN_DOCUMENT: &str = r"\begin{document}
\thispagestyle{fancy}
\renewcommand{\headrulewidth}{0pt}
\fancyhead{}
\fancyfoot[C]{
	\lower.5ex\hbox{\includegraphics[scale=0.5]{img/cc-byncsa}} \qquad
	{\small \color{black!70} \authors, Universidad Complutense de Madrid \qquad 2023}
}
";

pub const EPILOGUE: &str = r"\end{document}
";

/// Rasterized logo referenced by [`BEGIN_DOCUMENT`]
pub const BRANDING_REFERENCE: &str = "img/cc-byncsa.pdf";

/// Sectioning commands for heading levels 2 to 6
pub const HEADINGS: [&str; 5] = [
    "section",
    "subsection",
    "subsubsection",
    "paragraph",
    "subparagraph",
];
