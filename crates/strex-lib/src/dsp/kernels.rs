//! Precomputed FIR kernels.

/// Least-squares band-pass (pass band 5–20 Hz, transition 4.5–5 and 20–20.5 Hz,
/// stop-band weight 500× the pass-band weight) for ECG sampled at 64 Hz.
/// 257 taps, linear phase.
pub const ECG_BANDPASS_64HZ: [f64; 257] = [
    -0.00047274160329729655, -0.00043910892627857214, 0.0008690244832754231,
    0.001258037598136202, -7.087033885958212e-05, -0.00031826848647040494,
    0.00026535857915577395, -0.000818339692446049, -0.001412493356903684,
    -1.9995228246496885e-05, 6.731335975029544e-05, -0.0006034937506308821,
    0.000867144392662181, 0.0015065160936252352, 0.00010310266272432967,
    0.0005471501253438398, 0.001190473245310476, -0.000766813653488821,
    -0.0012037758114166867, 3.154772567048894e-05, -0.001263018353062374,
    -0.0017863067743217644, 0.00045997532952362036, 0.00032716936532333846,
    -0.0005264417711615749, 0.0017385569813467598, 0.0019889763081323048,
    -0.00010568777171728596, 0.0010085738914262328, 0.0013166081526789664,
    -0.0016828106527494164, -0.001395439535420146, 3.631473123555658e-06,
    -0.0023580287405196377, -0.002032972787516647, 0.0010570699668545353,
    -0.00012914364940099166, -0.0003854690266289664, 0.0031026282496664534,
    0.0020891652801278008, -0.0001704097853981826, 0.0022345403662649204,
    0.001166214145473753, -0.002773962659831527, -0.0009811744760156095,
    -0.0004474111646226518, -0.00409703007106872, -0.0018325183286839334,
    0.0013776445217438264, -0.001321158387918934, 0.00037867414252590244,
    0.004738083907977748, 0.0016152763281365053, 0.0005017200980161078,
    0.004127688884962448, 0.0003217130968633994, -0.003544422900098705,
    5.932003412603951e-05, -0.0019474610880871877, -0.0061508063614235204,
    -0.0009966566529745263, 0.000715735000418785, -0.0030500439336004766,
    0.002237527361133584, 0.006049433963213021, 0.0006666690011268514,
    0.0026644168389579857, 0.006246430181548597, -0.0013664646323465145,
    -0.0031859375309942206, 0.0013346226939773137, -0.0050751244870977765,
    -0.007849170609782605, 0.0002033708169353673, -0.0018091340945632787,
    -0.004687518423417901, 0.005365251746327558, 0.006190585556647233,
    -7.43680515331543e-05, 0.007057537272233331, 0.007820686780331368,
    -0.003497215093696401, -0.0007607954887443787, 0.0018835178013735779,
    -0.010170003906003915, -0.00836794231252807, 0.0007457736192457972,
    -0.007110691402126307, -0.005216556490869662, 0.009429240138251305,
    0.004299711641651361, 0.0008993483609633713, 0.014397066723216726,
    0.007996254947312816, -0.0048304877652042425, 0.0047345958483986945,
    4.939051058618679e-05, -0.017446053084898286, -0.0070564384166471135,
    -0.0016381246987034455, -0.016536831781655714, -0.0033074012030230105,
    0.01358015882580387, -0.0004636702549796613, 0.00677040491023126,
    0.02648707740086066, 0.006154035258022055, -0.0024533091741237006,
    0.015497475687231985, -0.007741030948169159, -0.028629194004745073,
    -0.0036522550021556997, -0.013632609634575552, -0.036030712287504166,
    0.003892492585157886, 0.016707802872025106, -0.011053287553443742,
    0.03100254242397691, 0.05731900993438313, 0.0016637598373008802,
    0.01871484058885556, 0.05161679720058941, -0.04888630943354992,
    -0.07341447656638471, 0.004008335285305453, -0.14044338414187663,
    -0.24550216720450374, 0.14662066861996004, 0.4794112611438435,
    0.14662066861996004, -0.24550216720450374, -0.14044338414187663,
    0.004008335285305453, -0.07341447656638471, -0.04888630943354992,
    0.05161679720058941, 0.01871484058885556, 0.0016637598373008802,
    0.05731900993438313, 0.03100254242397691, -0.011053287553443742,
    0.016707802872025106, 0.003892492585157886, -0.036030712287504166,
    -0.013632609634575552, -0.0036522550021556997, -0.028629194004745073,
    -0.007741030948169159, 0.015497475687231985, -0.0024533091741237006,
    0.006154035258022055, 0.02648707740086066, 0.00677040491023126,
    -0.0004636702549796613, 0.01358015882580387, -0.0033074012030230105,
    -0.016536831781655714, -0.0016381246987034455, -0.0070564384166471135,
    -0.017446053084898286, 4.939051058618679e-05, 0.0047345958483986945,
    -0.0048304877652042425, 0.007996254947312816, 0.014397066723216726,
    0.0008993483609633713, 0.004299711641651361, 0.009429240138251305,
    -0.005216556490869662, -0.007110691402126307, 0.0007457736192457972,
    -0.00836794231252807, -0.010170003906003915, 0.0018835178013735779,
    -0.0007607954887443787, -0.003497215093696401, 0.007820686780331368,
    0.007057537272233331, -7.43680515331543e-05, 0.006190585556647233,
    0.005365251746327558, -0.004687518423417901, -0.0018091340945632787,
    0.0002033708169353673, -0.007849170609782605, -0.0050751244870977765,
    0.0013346226939773137, -0.0031859375309942206, -0.0013664646323465145,
    0.006246430181548597, 0.0026644168389579857, 0.0006666690011268514,
    0.006049433963213021, 0.002237527361133584, -0.0030500439336004766,
    0.000715735000418785, -0.0009966566529745263, -0.0061508063614235204,
    -0.0019474610880871877, 5.932003412603951e-05, -0.003544422900098705,
    0.0003217130968633994, 0.004127688884962448, 0.0005017200980161078,
    0.0016152763281365053, 0.004738083907977748, 0.00037867414252590244,
    -0.001321158387918934, 0.0013776445217438264, -0.0018325183286839334,
    -0.00409703007106872, -0.0004474111646226518, -0.0009811744760156095,
    -0.002773962659831527, 0.001166214145473753, 0.0022345403662649204,
    -0.0001704097853981826, 0.0020891652801278008, 0.0031026282496664534,
    -0.0003854690266289664, -0.00012914364940099166, 0.0010570699668545353,
    -0.002032972787516647, -0.0023580287405196377, 3.631473123555658e-06,
    -0.001395439535420146, -0.0016828106527494164, 0.0013166081526789664,
    0.0010085738914262328, -0.00010568777171728596, 0.0019889763081323048,
    0.0017385569813467598, -0.0005264417711615749, 0.00032716936532333846,
    0.00045997532952362036, -0.0017863067743217644, -0.001263018353062374,
    3.154772567048894e-05, -0.0012037758114166867, -0.000766813653488821,
    0.001190473245310476, 0.0005471501253438398, 0.00010310266272432967,
    0.0015065160936252352, 0.000867144392662181, -0.0006034937506308821,
    6.731335975029544e-05, -1.9995228246496885e-05, -0.001412493356903684,
    -0.000818339692446049, 0.00026535857915577395, -0.00031826848647040494,
    -7.087033885958212e-05, 0.001258037598136202, 0.0008690244832754231,
    -0.00043910892627857214, -0.00047274160329729655,
];

/// Sampling frequency [`ECG_BANDPASS_64HZ`] was designed for.
pub const ECG_BANDPASS_FS: f64 = 64.0;

/// Antisymmetric five-point derivative, zero response to a constant offset.
pub const DERIVATIVE: [f64; 5] = [-1.0 / 8.0, -2.0 / 8.0, 0.0, 2.0 / 8.0, 1.0 / 8.0];
